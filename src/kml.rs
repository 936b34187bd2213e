//! KML line geometry parsing.
//!
//! Streams the document with quick-xml and collects line geometries in
//! document order:
//!
//! - `LineString` and `gx:Track` become [`Geometry::LineString`]
//! - `MultiGeometry` whose members are all lines, and `gx:MultiTrack`, become
//!   [`Geometry::MultiLineString`]
//! - everything else (`Point`, `Polygon`, `Model`, mixed collections) becomes
//!   [`Geometry::Other`] and contributes no coordinates
//!
//! Nested `MultiGeometry` members are flattened into the outermost one. A
//! `MultiGeometry` with a single member behaves as that member.
//!
//! Coordinate components are read leniently: anything that does not parse as
//! a number becomes NaN and is dropped later by the normalizer.

use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, RouteError};

/// One coordinate tuple as written in the document: `lon, lat[, alt]`.
///
/// Components that failed to parse are NaN; the tuple may hold fewer than two
/// components if the source was truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCoordinate(pub Vec<f64>);

impl RawCoordinate {
    pub fn longitude(&self) -> Option<f64> {
        self.0.first().copied()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.0.get(1).copied()
    }

    /// Altitude in meters, when present. Ignored by the rest of the pipeline.
    pub fn altitude(&self) -> Option<f64> {
        self.0.get(2).copied()
    }
}

/// A geometry found in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    LineString(Vec<RawCoordinate>),
    MultiLineString(Vec<Vec<RawCoordinate>>),
    /// Non-line geometry, by element name (or "GeometryCollection")
    Other(String),
}

impl Geometry {
    /// Coordinates this geometry contributes to the flat route, in order.
    pub fn line_coordinates(&self) -> Vec<RawCoordinate> {
        match self {
            Geometry::LineString(coords) => coords.clone(),
            Geometry::MultiLineString(lines) => lines.iter().flatten().cloned().collect(),
            Geometry::Other(_) => Vec::new(),
        }
    }

    pub fn is_line(&self) -> bool {
        !matches!(self, Geometry::Other(_))
    }
}

/// Parse every geometry in the document, in document order.
///
/// Fails with [`RouteError::Parse`] on malformed XML. An empty document or
/// one without geometries yields an empty list.
pub fn parse_geometries(kml: &str) -> Result<Vec<Geometry>> {
    let mut reader = Reader::from_str(kml);
    reader.trim_text(true);

    let mut state = GeometryCollector::default();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            RouteError::parse(format!(
                "XML error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(ref e) => {
                state.open(e.local_name().as_ref());
            }
            Event::Empty(ref e) => {
                let name = e.local_name();
                state.open(name.as_ref());
                state.close(name.as_ref())?;
            }
            Event::End(ref e) => {
                state.close(e.local_name().as_ref())?;
            }
            // Only coordinate text is unescaped; names and descriptions may
            // carry HTML entities that are not valid XML
            Event::Text(ref e) if state.in_coordinates() => {
                let text = e.unescape().map_err(|e| {
                    RouteError::parse(format!("failed to unescape text: {}", e))
                })?;
                state.text(&text)?;
            }
            Event::Text(ref e) => {
                state.text(&String::from_utf8_lossy(e))?;
            }
            Event::CData(ref e) => {
                state.text(&String::from_utf8_lossy(e))?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = state.stack.last() {
        return Err(RouteError::parse(format!(
            "unexpected end of document: <{}> is not closed",
            String::from_utf8_lossy(open)
        )));
    }

    debug!(
        "[KmlParser] Found {} geometries ({} lines)",
        state.geometries.len(),
        state.geometries.iter().filter(|g| g.is_line()).count()
    );

    Ok(state.geometries)
}

/// Parse the document into one flat, ordered coordinate sequence.
///
/// LineStrings contribute their coordinates verbatim, MultiLineStrings the
/// concatenation of their member lines; other geometries contribute nothing.
pub fn parse_coordinates(kml: &str) -> Result<Vec<RawCoordinate>> {
    let geometries = parse_geometries(kml)?;
    Ok(geometries
        .iter()
        .flat_map(|g| g.line_coordinates())
        .collect())
}

// ============================================================================
// Event handling
// ============================================================================

#[derive(Default)]
struct GeometryCollector {
    /// Open elements, by local name
    stack: Vec<Vec<u8>>,
    /// Open MultiGeometry / MultiTrack members
    collections: Vec<Vec<Geometry>>,
    /// Line under construction (LineString or Track)
    line: Option<Vec<RawCoordinate>>,
    /// Text of the open `coordinates` / `coord` element
    coord_text: String,
    geometries: Vec<Geometry>,
}

impl GeometryCollector {
    fn open(&mut self, name: &[u8]) {
        match name {
            b"MultiGeometry" | b"MultiTrack" => self.collections.push(Vec::new()),
            b"LineString" | b"Track" => self.line = Some(Vec::new()),
            b"coordinates" | b"coord" => self.coord_text.clear(),
            _ => {}
        }
        self.stack.push(name.to_vec());
    }

    fn close(&mut self, name: &[u8]) -> Result<()> {
        match self.stack.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(RouteError::parse(format!(
                    "expected </{}>, found </{}>",
                    String::from_utf8_lossy(&open),
                    String::from_utf8_lossy(name)
                )))
            }
            None => {
                return Err(RouteError::parse(format!(
                    "unexpected </{}>",
                    String::from_utf8_lossy(name)
                )))
            }
        }
        let parent = self.stack.last().map(|p| p.as_slice());
        let in_line_string = parent == Some(b"LineString".as_slice());
        let in_track = parent == Some(b"Track".as_slice());

        match name {
            b"coordinates" if in_line_string => {
                if let Some(line) = self.line.as_mut() {
                    line.extend(parse_coordinate_tuples(&self.coord_text));
                }
            }
            b"coord" if in_track => {
                if let Some(line) = self.line.as_mut() {
                    line.push(parse_track_coord(&self.coord_text));
                }
            }
            b"LineString" | b"Track" => {
                let coords = self.line.take().unwrap_or_default();
                self.emit(Geometry::LineString(coords));
            }
            b"Point" | b"Polygon" | b"Model" => {
                self.emit(Geometry::Other(String::from_utf8_lossy(name).into_owned()));
            }
            b"MultiGeometry" | b"MultiTrack" => {
                let members = self.collections.pop().unwrap_or_default();
                match self.collections.last_mut() {
                    // Nested collections are flattened into the outer one
                    Some(outer) => outer.extend(members),
                    None => self.geometries.push(classify_collection(members)),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn in_coordinates(&self) -> bool {
        matches!(
            self.stack.last().map(|n| n.as_slice()),
            Some(b"coordinates") | Some(b"coord")
        )
    }

    fn text(&mut self, text: &str) -> Result<()> {
        match self.stack.last().map(|n| n.as_slice()) {
            // Chunks split by comments or CDATA arrive trimmed; keep tuples apart
            Some(b"coordinates") | Some(b"coord") => {
                self.coord_text.push(' ');
                self.coord_text.push_str(text);
            }
            Some(_) => {}
            None if text.trim().is_empty() => {}
            None => {
                return Err(RouteError::parse(
                    "text content outside of the root element",
                ))
            }
        }
        Ok(())
    }

    fn emit(&mut self, geometry: Geometry) {
        match self.collections.last_mut() {
            Some(members) => members.push(geometry),
            None => self.geometries.push(geometry),
        }
    }
}

fn classify_collection(mut members: Vec<Geometry>) -> Geometry {
    if members.len() == 1 {
        return members.remove(0);
    }
    if members.is_empty() {
        return Geometry::Other("MultiGeometry".to_string());
    }
    if members.iter().all(|m| matches!(m, Geometry::LineString(_))) {
        let lines = members
            .into_iter()
            .filter_map(|m| match m {
                Geometry::LineString(coords) => Some(coords),
                _ => None,
            })
            .collect();
        return Geometry::MultiLineString(lines);
    }
    Geometry::Other("GeometryCollection".to_string())
}

/// `coordinates` text: whitespace-separated `lon,lat[,alt]` tuples.
fn parse_coordinate_tuples(text: &str) -> Vec<RawCoordinate> {
    text.split_whitespace()
        .map(|tuple| RawCoordinate(tuple.split(',').map(parse_component).collect()))
        .collect()
}

/// `gx:coord` text: one `lon lat alt` tuple separated by spaces.
fn parse_track_coord(text: &str) -> RawCoordinate {
    RawCoordinate(text.split_whitespace().map(parse_component).collect())
}

fn parse_component(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}
