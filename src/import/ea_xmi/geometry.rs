//! Decoding of EA's ad-hoc diagram geometry strings.
//!
//! EA encodes node bounds and connector waypoints in at least three string
//! shapes, depending on version and export path:
//!
//! - key=value runs: `Left=35;Top=312;Right=128;Bottom=372;`
//! - bare numeric lists: `35;312;128;372` (LTRB) or `35;312;93;60` (XYWH)
//! - an embedded `Path=` segment inside a larger geometry/style string:
//!   `…;Path=10:20;60:20;60:40;…` — coordinate tokens are themselves
//!   semicolon-separated, so scanning stops at the next `key=value` token,
//!   not at the next semicolon.
//!
//! Decoders are defensive: anything that does not parse yields `None`, never
//! a partially populated value.

use crate::ir::{Bounds, Point};

/// Decode a geometry string into bounds: key=value LTRB first, bare numeric
/// list second (LTRB when the 3rd/4th numbers exceed the 1st/2nd, else XYWH).
pub(crate) fn decode_bounds_string(raw: &str) -> Option<Bounds> {
    if raw.contains('=') {
        return decode_ltrb_pairs(raw);
    }
    let numbers = extract_numbers(raw);
    if numbers.len() < 4 {
        return None;
    }
    let (a, b, c, d) = (numbers[0], numbers[1], numbers[2], numbers[3]);
    if c > a && d > b {
        Some(ltrb(a, b, c, d))
    } else {
        Some(Bounds::new(a, b, c, d))
    }
}

fn decode_ltrb_pairs(raw: &str) -> Option<Bounds> {
    let mut left = None;
    let mut top = None;
    let mut right = None;
    let mut bottom = None;

    for token in raw.split(';') {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<f64>() else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "l" | "left" => left = Some(value),
            "t" | "top" => top = Some(value),
            "r" | "right" => right = Some(value),
            "b" | "bottom" => bottom = Some(value),
            _ => {}
        }
    }

    match (left, top, right, bottom) {
        (Some(l), Some(t), Some(r), Some(b)) => Some(ltrb(l, t, r, b)),
        _ => None,
    }
}

fn ltrb(left: f64, top: f64, right: f64, bottom: f64) -> Bounds {
    // EA sometimes stores top/bottom mirrored (negative y axis); absolute
    // extents keep the invariant that width/height are non-negative.
    Bounds::new(
        left.min(right),
        top.min(bottom),
        (right - left).abs(),
        (bottom - top).abs(),
    )
}

/// Decode the `Path=` segment embedded in a geometry/style string.
///
/// An empty `Path=` yields `None`; coordinates from unrelated fields after
/// the path never leak in because scanning stops at the first token that is
/// not an `x:y` pair.
pub(crate) fn decode_path_points(raw: &str) -> Option<Vec<Point>> {
    let start = raw.find("Path=")? + "Path=".len();
    let mut points = Vec::new();
    for token in raw[start..].split(';') {
        let Some(point) = parse_coordinate(token) else {
            break;
        };
        points.push(point);
    }
    (!points.is_empty()).then_some(points)
}

/// Decode an explicit point-list attribute: `x:y` or `x,y` pairs separated
/// by semicolons or whitespace.
pub(crate) fn decode_point_list(raw: &str) -> Option<Vec<Point>> {
    let points: Vec<Point> = raw
        .split([';', ' '])
        .filter(|t| !t.trim().is_empty())
        .map_while(parse_coordinate)
        .collect();
    (!points.is_empty()).then_some(points)
}

/// Whether a geometry string describes an edge rather than a node.
pub(crate) fn looks_edge_like(raw: &str) -> bool {
    (raw.contains("SX=") && raw.contains("EX=")) || raw.contains("EDGE=") || raw.contains("Path=")
}

fn parse_coordinate(token: &str) -> Option<Point> {
    let token = token.trim();
    if token.is_empty() || token.contains('=') {
        return None;
    }
    let (x, y) = token.split_once([':', ','])?;
    let x = x.trim().parse::<f64>().ok()?;
    let y = y.trim().parse::<f64>().ok()?;
    Some(Point { x, y })
}

fn extract_numbers(raw: &str) -> Vec<f64> {
    raw.split([';', ',', ':', ' '])
        .filter_map(|t| t.trim().parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_decode_ltrb_pairs() {
        let bounds = decode_bounds_string("Left=35;Top=312;Right=128;Bottom=372;").unwrap();
        assert_eq!(bounds, Bounds::new(35.0, 312.0, 93.0, 60.0));
    }

    #[test]
    fn test_decode_ltrb_pairs_ignores_foreign_keys() {
        let bounds = decode_bounds_string("SX=0;Left=10;Top=20;Right=30;Bottom=40;EOID=x;").unwrap();
        assert_eq!(bounds, Bounds::new(10.0, 20.0, 20.0, 20.0));
    }

    #[rstest]
    // 3rd/4th exceed 1st/2nd: LTRB.
    #[case("10;20;110;220", Bounds::new(10.0, 20.0, 100.0, 200.0))]
    // Otherwise: XYWH.
    #[case("100;200;50;40", Bounds::new(100.0, 200.0, 50.0, 40.0))]
    fn test_decode_bare_numeric_list(#[case] raw: &str, #[case] expected: Bounds) {
        assert_eq!(decode_bounds_string(raw), Some(expected));
    }

    #[test]
    fn test_decode_bounds_rejects_partial_input() {
        assert_eq!(decode_bounds_string("Left=10;Top=20;"), None);
        assert_eq!(decode_bounds_string("10;20;30"), None);
        assert_eq!(decode_bounds_string(""), None);
    }

    #[test]
    fn test_decode_path_points() {
        let raw = "SX=0;SY=0;EX=0;EY=0;Path=10:20;60:20;60:40;200:40;EDGE=2;";
        let points = decode_path_points(raw).unwrap();
        assert_eq!(
            points,
            vec![
                Point { x: 10.0, y: 20.0 },
                Point { x: 60.0, y: 20.0 },
                Point { x: 60.0, y: 40.0 },
                Point { x: 200.0, y: 40.0 },
            ]
        );
    }

    #[test]
    fn test_empty_path_yields_no_points() {
        assert_eq!(decode_path_points("SX=0;SY=0;Path=;EDGE=2;"), None);
        assert_eq!(decode_path_points("SX=0;SY=0;Path="), None);
        // No Path= at all.
        assert_eq!(decode_path_points("SX=0;SY=0;EDGE=2;"), None);
    }

    #[test]
    fn test_path_stops_at_next_key_value_token() {
        let points = decode_path_points("Path=1:2;3:4;LLB=;5:6;").unwrap();
        assert_eq!(points.len(), 2, "tokens after a key=value must not leak in");
    }

    #[test]
    fn test_decode_point_list() {
        let points = decode_point_list("10,20;30,40").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1], Point { x: 30.0, y: 40.0 });
        assert_eq!(decode_point_list(""), None);
    }

    #[test]
    fn test_looks_edge_like() {
        assert!(looks_edge_like("SX=0;SY=0;EX=10;EY=10;"));
        assert!(looks_edge_like("EDGE=3;"));
        assert!(!looks_edge_like("Left=1;Top=2;Right=3;Bottom=4;"));
    }
}
