//! Two-hop path resolution and interpolation along polylines.

use std::sync::Arc;

use crate::{
    models::{LocationId, Point},
    topology::Topology,
};

/// Resolves routes over a [`Topology`] using a direct connection or a
/// single detour through the hub. This is not a general shortest-path
/// search; every yard location is expected to be within two hops.
#[derive(Debug, Clone)]
pub struct PathResolver {
    topology: Arc<Topology>,
}

impl PathResolver {
    /// Create a resolver over the given topology.
    pub fn new(topology: Arc<Topology>) -> Self {
        Self { topology }
    }

    /// Topology the resolver routes over.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Ordered polyline from `from` to `to`, or an empty vector when the
    /// destination is unreachable. Asking for a route to the current
    /// location yields an empty path as well.
    pub fn resolve(&self, from: &LocationId, to: &LocationId) -> Vec<Point> {
        if from == to {
            return Vec::new();
        }

        if let Some(direct) = self.topology.waypoints(from, to) {
            return direct;
        }

        let hub = self.topology.hub();
        if from == hub || to == hub {
            return Vec::new();
        }

        match (
            self.topology.waypoints(from, hub),
            self.topology.waypoints(hub, to),
        ) {
            (Some(mut inbound), Some(outbound)) => {
                // Both legs share the hub coordinate at the join.
                let skip = usize::from(!inbound.is_empty());
                inbound.extend(outbound.into_iter().skip(skip));
                inbound
            }
            _ => Vec::new(),
        }
    }
}

/// Position along `path` at `progress` in `[0, 1]`.
///
/// Progress is spread evenly over segments regardless of their length: the
/// segment is `floor(progress * (n - 1))` and the remainder interpolates
/// within it. Returns `None` for an empty path.
pub fn interpolate_along_path(path: &[Point], progress: f64) -> Option<Point> {
    let (first, last) = (path.first()?, path.last()?);
    if path.len() == 1 {
        return Some(*first);
    }

    let progress = progress.clamp(0.0, 1.0);
    let scaled = progress * (path.len() - 1) as f64;
    let segment = scaled.floor() as usize;
    if segment >= path.len() - 1 {
        return Some(*last);
    }

    let t = scaled - segment as f64;
    Some(path[segment].lerp(path[segment + 1], t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::tests::small_yard;

    fn resolver() -> PathResolver {
        PathResolver::new(Arc::new(small_yard()))
    }

    #[test]
    fn direct_connection_is_returned_as_is() {
        let path = resolver().resolve(&"A".into(), &"B".into());
        assert_eq!(path, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    }

    #[test]
    fn direct_connection_is_oriented_to_the_request() {
        let path = resolver().resolve(&"B".into(), &"A".into());
        assert_eq!(path, vec![Point::new(10.0, 0.0), Point::new(0.0, 0.0)]);
    }

    #[test]
    fn hub_detour_drops_duplicate_join() {
        let resolver = resolver();
        let topology = resolver.topology().clone();
        let inbound = topology.waypoints(&"A".into(), &"H".into()).unwrap();
        let outbound = topology.waypoints(&"H".into(), &"C".into()).unwrap();

        let path = resolver.resolve(&"A".into(), &"C".into());
        assert_eq!(path.len(), inbound.len() + outbound.len() - 1);
        assert_eq!(
            path,
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 5.0),
                Point::new(0.0, 10.0),
                Point::new(5.0, 10.0),
                Point::new(10.0, 10.0),
            ]
        );
    }

    #[test]
    fn unreachable_yields_empty_path() {
        let resolver = resolver();
        assert!(resolver.resolve(&"A".into(), &"D".into()).is_empty());
        assert!(resolver.resolve(&"B".into(), &"C".into()).is_empty());
        assert!(resolver.resolve(&"A".into(), &"A".into()).is_empty());
        assert!(resolver.resolve(&"A".into(), &"nowhere".into()).is_empty());
    }

    #[test]
    fn interpolation_hits_endpoints_exactly() {
        let path = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 7.0),
            Point::new(11.0, 2.0),
        ];
        assert_eq!(interpolate_along_path(&path, 0.0), Some(path[0]));
        assert_eq!(interpolate_along_path(&path, 1.0), Some(path[2]));
        assert_eq!(interpolate_along_path(&path, 1.5), Some(path[2]));
        assert_eq!(interpolate_along_path(&path, 0.5), Some(path[1]));
        assert_eq!(interpolate_along_path(&[], 0.5), None);
        assert_eq!(interpolate_along_path(&path[..1], 0.7), Some(path[0]));
    }

    #[test]
    fn interpolation_matches_two_point_example() {
        let path = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        assert_eq!(
            interpolate_along_path(&path, 0.5),
            Some(Point::new(5.0, 0.0))
        );
        assert_eq!(
            interpolate_along_path(&path, 1.0),
            Some(Point::new(10.0, 0.0))
        );
    }

    #[test]
    fn distance_along_path_increases_with_progress() {
        let path = resolver().resolve(&"A".into(), &"C".into());
        let mut travelled = Vec::new();
        for step in 0..=40 {
            let progress = f64::from(step) / 40.0;
            let point = interpolate_along_path(&path, progress).unwrap();
            travelled.push(distance_along(&path, point));
        }
        assert!(travelled.windows(2).all(|pair| pair[1] > pair[0]));
    }

    fn distance_along(path: &[Point], point: Point) -> f64 {
        let mut acc = 0.0;
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let segment = a.distance(b);
            let offset = a.distance(point);
            if (offset + point.distance(b) - segment).abs() < 1e-9 {
                return acc + offset;
            }
            acc += segment;
        }
        acc
    }
}
