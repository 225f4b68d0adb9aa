//! End-to-end SVG path scenarios.

use pdf_forge::svg::{PathOptions, PathParser, PathSegment, PathSink, execute_path};

#[derive(Default)]
struct CountingSink {
    moves: usize,
    lines: usize,
    curves: usize,
    quads: usize,
    closes: usize,
    last_point: (f64, f64),
}

impl PathSink for CountingSink {
    fn move_to(&mut self, x: f64, y: f64) {
        self.moves += 1;
        self.last_point = (x, y);
    }
    fn line_to(&mut self, x: f64, y: f64) {
        self.lines += 1;
        self.last_point = (x, y);
    }
    fn curve_to(&mut self, _: f64, _: f64, _: f64, _: f64, x: f64, y: f64) {
        self.curves += 1;
        self.last_point = (x, y);
    }
    fn quadratic_curve_to(&mut self, _: f64, _: f64, x: f64, y: f64) {
        self.quads += 1;
        self.last_point = (x, y);
    }
    fn close(&mut self) {
        self.closes += 1;
    }
}

#[test]
fn test_compact_arc_flag_form() {
    // `a1 1 0 00.5.5` parses as rx=1 ry=1 rot=0 large=0 sweep=0 x=.5 y=.5:
    // exactly two commands.
    let segments: Vec<PathSegment> = PathParser::new("M0 0 a1 1 0 00.5.5")
        .collect::<pdf_forge::Result<Vec<_>>>()
        .unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(
        segments[0],
        PathSegment::MoveTo {
            relative: false,
            x: 0.0,
            y: 0.0
        }
    );
    assert_eq!(
        segments[1],
        PathSegment::Arc {
            relative: true,
            rx: 1.0,
            ry: 1.0,
            rotation: 0.0,
            large_arc: false,
            sweep: false,
            x: 0.5,
            y: 0.5
        }
    );
}

#[test]
fn test_final_point_matches_last_endpoint() {
    let no_flip = PathOptions {
        flip_y: false,
        ..PathOptions::default()
    };

    let cases: &[(&str, (f64, f64))] = &[
        ("M 1 2", (1.0, 2.0)),
        ("M 1 2 L 10 20", (10.0, 20.0)),
        ("M 0 0 C 1 1 2 2 3 3 S 5 5 6 6", (6.0, 6.0)),
        ("M 0 0 Q 1 1 2 0 T 4 0", (4.0, 0.0)),
        ("M 5 5 h 10 v 10", (15.0, 15.0)),
        ("M 1 0 A 1 1 0 0 1 0 1", (0.0, 1.0)),
        // After a close, the current point is the subpath start
        ("M 7 8 L 9 9 Z", (7.0, 8.0)),
        ("M 0 0 10 0 10 10", (10.0, 10.0)),
    ];

    for &(d, expected) in cases {
        let mut sink = CountingSink::default();
        let end = execute_path(d, &no_flip, &mut sink).unwrap();
        assert!(
            (end.0 - expected.0).abs() < 1e-9 && (end.1 - expected.1).abs() < 1e-9,
            "path {:?}: got {:?}, expected {:?}",
            d,
            end,
            expected
        );
    }
}

#[test]
fn test_sink_receives_five_operation_vocabulary() {
    let mut sink = CountingSink::default();
    execute_path(
        "M 0 0 L 1 0 C 1 1 2 1 2 0 Q 3 1 4 0 A 1 1 0 0 1 6 0 Z",
        &PathOptions::default(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(sink.moves, 1);
    assert_eq!(sink.lines, 1);
    assert!(sink.curves >= 2); // explicit cubic + arc conversion
    assert_eq!(sink.quads, 1);
    assert_eq!(sink.closes, 1);
}

#[test]
fn test_arc_endpoint_exact_under_transform() {
    let options = PathOptions {
        flip_y: true,
        scale: 2.0,
        translate_x: 50.0,
        translate_y: 100.0,
    };
    let mut sink = CountingSink::default();
    let end = execute_path("M 0 0 A 10 10 0 0 1 20 0", &options, &mut sink).unwrap();

    // Absolute endpoint (20, 0) -> (20*2+50, 0*-2+100)
    assert!((end.0 - 90.0).abs() < 1e-9);
    assert!((end.1 - 100.0).abs() < 1e-9);
    assert_eq!(sink.last_point, end);
}

#[test]
fn test_multiple_subpaths() {
    let mut sink = CountingSink::default();
    execute_path(
        "M 0 0 L 1 1 Z M 10 10 L 11 11 Z",
        &PathOptions::default(),
        &mut sink,
    )
    .unwrap();
    assert_eq!(sink.moves, 2);
    assert_eq!(sink.closes, 2);
}
