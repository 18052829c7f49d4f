//! Planar geometry helpers for region membership and charger distance.

/// Point-in-polygon test using the even-odd ray casting rule.
///
/// The polygon is a closed loop of vertices; the closing edge from the last
/// vertex back to the first is implied. Points exactly on an edge count as
/// inside, which matches how the device itself attributes boundary positions.
pub fn point_in_polygon(x: f64, y: f64, polygon: &[(f64, f64)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];

        if on_segment(x, y, xi, yi, xj, yj) {
            return true;
        }

        if (yi > y) != (yj > y) {
            let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Euclidean distance between two points
pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
}

/// Whether (x, y) lies on the segment (x1, y1)-(x2, y2), within tolerance
fn on_segment(x: f64, y: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    const EPS: f64 = 1e-9;
    let cross = (x2 - x1) * (y - y1) - (y2 - y1) * (x - x1);
    if cross.abs() > EPS * distance(x1, y1, x2, y2).max(1.0) {
        return false;
    }
    x >= x1.min(x2) - EPS && x <= x1.max(x2) + EPS && y >= y1.min(y2) - EPS && y <= y1.max(y2) + EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: [(f64, f64); 4] = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];

    #[test]
    fn test_point_inside_square() {
        assert!(point_in_polygon(5.0, 5.0, &SQUARE));
        assert!(!point_in_polygon(15.0, 5.0, &SQUARE));
        assert!(!point_in_polygon(-1.0, 5.0, &SQUARE));
    }

    #[test]
    fn test_point_on_edge_counts_as_inside() {
        assert!(point_in_polygon(0.0, 5.0, &SQUARE));
        assert!(point_in_polygon(5.0, 0.0, &SQUARE));
        assert!(point_in_polygon(10.0, 10.0, &SQUARE));
    }

    #[test]
    fn test_concave_polygon() {
        // L-shape: the notch at (7, 7) is outside
        let poly = [
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 5.0),
            (5.0, 5.0),
            (5.0, 10.0),
            (0.0, 10.0),
        ];
        assert!(point_in_polygon(2.0, 8.0, &poly));
        assert!(point_in_polygon(8.0, 2.0, &poly));
        assert!(!point_in_polygon(7.0, 7.0, &poly));
    }

    #[test]
    fn test_degenerate_polygon_is_never_inside() {
        assert!(!point_in_polygon(0.0, 0.0, &[]));
        assert!(!point_in_polygon(0.0, 0.0, &[(0.0, 0.0), (1.0, 1.0)]));
    }

    #[test]
    fn test_distance() {
        assert!((distance(0.0, 0.0, 3.0, 4.0) - 5.0).abs() < 1e-9);
        assert_eq!(distance(1.0, 1.0, 1.0, 1.0), 0.0);
    }
}
