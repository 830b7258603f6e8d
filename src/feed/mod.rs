//! Timing feed parsing: vendor XML in, ordered per-play intervals out.
//!
//! A feed is one `<dataset>` of `<row>` nodes, one row per play, each carrying
//! the play's start timestamp in the recording. A play's end is the next
//! play's start; the last play has none. Administrative rows (timeouts, the
//! two-minute warning) are excluded from the result but still bound their
//! neighbors' intervals.

pub mod cache;
pub mod store;

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::AppError;
use crate::timecode::PlayTime;

/// Which recording the feed timestamps are aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingDialect {
    /// Unedited coach tape; timestamps in true milliseconds, already aligned
    /// to the delivered file.
    Coach,
    /// Televised broadcast; timestamps in tens of milliseconds, needing
    /// offset correction against the downloaded file's real duration.
    Broadcast,
}

impl TimingDialect {
    /// Row element that carries the start timestamp in this dialect.
    fn start_field(self) -> &'static str {
        match self {
            Self::Coach => "catin",
            Self::Broadcast => "archivetcin",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coach => "coach",
            Self::Broadcast => "broadcast",
        }
    }
}

/// Identity of one game: the vendor event id and the schedule game key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameId {
    pub eid: String,
    pub game_key: String,
}

impl GameId {
    pub fn new(eid: impl Into<String>, game_key: impl Into<String>) -> Self {
        Self {
            eid: eid.into(),
            game_key: game_key.into(),
        }
    }
}

/// Start and end timing of a single play.
#[derive(Debug, Clone)]
pub struct Play {
    /// Vendor-assigned play identifier, unique within a game.
    pub id: String,
    pub start: PlayTime,
    /// The next play's start, or `None` for the last play of the game.
    pub end: Option<PlayTime>,
    /// Reported end of the broadcast, carried from the feed header. Absent in
    /// older feeds.
    pub broadcast_end: Option<PlayTime>,
}

impl Play {
    /// File stem for this play's clip. Numeric ids are zero-padded so clips
    /// sort in play order; other ids are used verbatim.
    pub fn file_stem(&self) -> String {
        match self.id.trim().parse::<u64>() {
            Ok(n) => format!("{n:04}"),
            Err(_) => self.id.trim().to_string(),
        }
    }
}

/// Plays keyed by id, preserving feed order (= chronological start order).
#[derive(Debug, Clone, Default)]
pub struct PlayMap {
    plays: Vec<Play>,
}

impl PlayMap {
    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Play> {
        self.plays.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Play> {
        self.plays.iter().find(|p| p.id == id)
    }

    /// Reported end-of-broadcast timestamp, identical on every play that
    /// carries one.
    pub fn broadcast_end(&self) -> Option<&PlayTime> {
        self.plays.iter().find_map(|p| p.broadcast_end.as_ref())
    }

    /// Insert, replacing an existing play with the same id in place.
    fn insert(&mut self, play: Play) {
        match self.plays.iter_mut().find(|p| p.id == play.id) {
            Some(existing) => *existing = play,
            None => self.plays.push(play),
        }
    }
}

impl<'a> IntoIterator for &'a PlayMap {
    type Item = &'a Play;
    type IntoIter = std::slice::Iter<'a, Play>;

    fn into_iter(self) -> Self::IntoIter {
        self.plays.iter()
    }
}

struct RawRow {
    id: String,
    start: PlayTime,
    attrs: HashMap<String, String>,
}

/// Parse a raw feed into ordered play intervals.
///
/// An unparsable document and a document with no usable timing rows are the
/// same condition to callers: [`AppError::NoTimingData`].
pub fn parse_feed(raw: &[u8], dialect: TimingDialect) -> Result<PlayMap, AppError> {
    let mut reader = Reader::from_reader(raw);
    let mut buf = Vec::new();
    let mut child_buf = Vec::new();
    let mut broadcast_end: Option<PlayTime> = None;
    let mut rows: Vec<RawRow> = Vec::new();
    let start_field = dialect.start_field();

    loop {
        buf.clear();
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(err) => {
                log::warn!(target: "playclip::feed", "unparsable timing feed: {}", err);
                return Err(AppError::NoTimingData);
            }
        };
        match event {
            Event::Eof => break,
            Event::Start(ref el) | Event::Empty(ref el) => {
                let name = element_name(el);
                if name == "dataset" {
                    broadcast_end = attr_value(el, "endtime").and_then(|text| {
                        match PlayTime::parse(&text) {
                            Ok(end) => Some(end),
                            Err(err) => {
                                log::warn!(
                                    target: "playclip::feed",
                                    "ignoring bad feed end timestamp: {}",
                                    err
                                );
                                None
                            }
                        }
                    });
                } else if name == "row" && matches!(event, Event::Start(_)) {
                    let attrs = collect_attrs(el);
                    let fields = match read_row_children(&mut reader, &mut child_buf) {
                        Ok(fields) => fields,
                        Err(err) => {
                            log::warn!(target: "playclip::feed", "unparsable timing feed: {}", err);
                            return Err(AppError::NoTimingData);
                        }
                    };
                    let id = fields
                        .get("id")
                        .cloned()
                        .or_else(|| attrs.get("playid").cloned());
                    let Some(id) = id else { continue };
                    let Some(start_text) = fields.get(start_field) else {
                        continue;
                    };
                    match PlayTime::parse(start_text) {
                        Ok(start) => rows.push(RawRow { id, start, attrs }),
                        Err(err) => {
                            log::debug!(
                                target: "playclip::feed",
                                "dropping play {}: {}",
                                id,
                                err
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if rows.is_empty() {
        return Err(AppError::NoTimingData);
    }

    // Guard against out-of-order feed corruption: a row starting strictly
    // before the previous retained row is dropped.
    let mut ordered: Vec<RawRow> = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(prev) = ordered.last() {
            if row.start < prev.start {
                log::debug!(
                    target: "playclip::feed",
                    "dropping out-of-order play {} ({} < {})",
                    row.id,
                    row.start,
                    prev.start
                );
                continue;
            }
        }
        ordered.push(row);
    }

    // Ends come from the full ordered list, before administrative rows are
    // excluded, so an excluded row still bounds its predecessor's interval.
    let ends: Vec<Option<PlayTime>> = (0..ordered.len())
        .map(|i| ordered.get(i + 1).map(|row| row.start))
        .collect();

    let mut plays = PlayMap::default();
    for (row, end) in ordered.iter().zip(ends) {
        if is_administrative(&row.attrs) {
            log::debug!(target: "playclip::feed", "excluding administrative play {}", row.id);
            continue;
        }
        plays.insert(Play {
            id: row.id.clone(),
            start: row.start,
            end,
            broadcast_end,
        });
    }

    if plays.is_empty() {
        return Err(AppError::NoTimingData);
    }
    Ok(plays)
}

/// Timeouts and the two-minute warning eat clock but are not plays.
fn is_administrative(attrs: &HashMap<String, String>) -> bool {
    let starts_with = |key: &str, prefix: &str| {
        attrs
            .get(key)
            .is_some_and(|v| v.trim().to_ascii_lowercase().starts_with(prefix))
    };
    starts_with("playdescription", "timeout")
        || starts_with("playdescription", "two-minute")
        || starts_with("preplaybyplay", "timeout")
}

// The vendor is not consistent about element and attribute casing, so all
// name matching goes through ASCII lowercasing.
fn element_name(el: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(el.local_name().as_ref()).to_ascii_lowercase()
}

fn collect_attrs(el: &BytesStart<'_>) -> HashMap<String, String> {
    el.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
            let value = attr.unescape_value().ok()?.trim().to_string();
            Some((key, value))
        })
        .collect()
}

fn attr_value(el: &BytesStart<'_>, name: &str) -> Option<String> {
    el.attributes().flatten().find_map(|attr| {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
        if key == name {
            Some(attr.unescape_value().ok()?.trim().to_string())
        } else {
            None
        }
    })
}

/// Read one `<row>`'s direct children into a name → text map. Returns when
/// the row closes.
fn read_row_children(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
) -> Result<HashMap<String, String>, quick_xml::Error> {
    let mut fields = HashMap::new();
    let mut current: Option<String> = None;
    let mut depth = 0usize;
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(ref el) => {
                depth += 1;
                if depth == 1 {
                    current = Some(element_name(el));
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    return Ok(fields);
                }
                depth -= 1;
                if depth == 0 {
                    current = None;
                }
            }
            Event::Text(ref text) => {
                if depth == 1 {
                    if let Some(name) = current.as_ref() {
                        let value = String::from_utf8_lossy(text).trim().to_string();
                        if !value.is_empty() {
                            fields.entry(name.clone()).or_insert(value);
                        }
                    }
                }
            }
            Event::Eof => return Ok(fields),
            _ => {}
        }
    }
}
