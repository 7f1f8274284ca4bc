use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of landmarks in a hand group.
pub const HAND_POINTS: usize = 21;

/// Number of landmarks in a pose group.
pub const POSE_POINTS: usize = 33;

/// Number of landmarks in a full face mesh. Face groups carry at least this
/// many points; only a configured subset of them is encoded.
pub const FACE_MESH_POINTS: usize = 468;

/// A 2D landmark position in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// Per-axis minimum of a set of points.
///
/// The x and y minima are taken independently, so the result is the top-left
/// corner of the points' bounding box and need not be one of the points.
/// Returns the origin for an empty set.
pub fn min_corner<'a, I>(points: I) -> Point
where
    I: IntoIterator<Item = &'a Point>,
{
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return Point::zero();
    };
    iter.fold(*first, |acc, p| Point::new(acc.x.min(p.x), acc.y.min(p.y)))
}

/// The kinds of landmark groups a detector reports.
///
/// The variant order is the order in which groups are laid out in a feature
/// vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupKind {
    LeftHand,
    RightHand,
    Face,
    Pose,
}

impl GroupKind {
    pub const ALL: [GroupKind; 4] = [
        GroupKind::LeftHand,
        GroupKind::RightHand,
        GroupKind::Face,
        GroupKind::Pose,
    ];

    pub const fn index(self) -> usize {
        match self {
            GroupKind::LeftHand => 0,
            GroupKind::RightHand => 1,
            GroupKind::Face => 2,
            GroupKind::Pose => 3,
        }
    }

    /// Minimum number of points a detected group of this kind must carry.
    /// Hand and pose groups must match it exactly.
    pub const fn detected_points(self) -> usize {
        match self {
            GroupKind::LeftHand | GroupKind::RightHand => HAND_POINTS,
            GroupKind::Face => FACE_MESH_POINTS,
            GroupKind::Pose => POSE_POINTS,
        }
    }

    fn accepts(self, len: usize) -> bool {
        match self {
            GroupKind::Face => len >= FACE_MESH_POINTS,
            _ => len == self.detected_points(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupKind::LeftHand => "left-hand",
            GroupKind::RightHand => "right-hand",
            GroupKind::Face => "face",
            GroupKind::Pose => "pose",
        };
        f.write_str(name)
    }
}

/// An ordered set of landmarks for one group.
///
/// Index `i` refers to the same anatomical point in every image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkGroup {
    pub points: Vec<Point>,
}

impl LandmarkGroup {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Create a group from a flat `[x0, y0, x1, y1, ...]` slice.
    pub fn from_flat(v: &[f32]) -> Self {
        debug_assert!(v.len() % 2 == 0);
        let points = v
            .chunks_exact(2)
            .map(|chunk| Point::new(chunk[0], chunk[1]))
            .collect();
        Self { points }
    }
}

impl std::ops::Index<usize> for LandmarkGroup {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

/// Detector output for one image: at most one group per [`GroupKind`].
///
/// Groups are validated on insertion, so every present group has the point
/// count its kind requires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    groups: [Option<LandmarkGroup>; 4],
}

impl Detections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Detections::insert`].
    pub fn with(mut self, kind: GroupKind, group: LandmarkGroup) -> Result<Self> {
        self.insert(kind, group)?;
        Ok(self)
    }

    /// Store a group, replacing any previous group of the same kind.
    pub fn insert(&mut self, kind: GroupKind, group: LandmarkGroup) -> Result<()> {
        if !kind.accepts(group.num_points()) {
            return Err(Error::InvalidDetection {
                kind,
                expected: kind.detected_points(),
                actual: group.num_points(),
            });
        }
        self.groups[kind.index()] = Some(group);
        Ok(())
    }

    pub fn remove(&mut self, kind: GroupKind) -> Option<LandmarkGroup> {
        self.groups[kind.index()].take()
    }

    pub fn get(&self, kind: GroupKind) -> Option<&LandmarkGroup> {
        self.groups[kind.index()].as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Option::is_none)
    }

    /// Kinds that are present, in encoding order.
    pub fn present(&self) -> impl Iterator<Item = GroupKind> + '_ {
        GroupKind::ALL
            .into_iter()
            .filter(move |kind| self.get(*kind).is_some())
    }
}
