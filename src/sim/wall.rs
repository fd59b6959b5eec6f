//! Rectangular wall geometry
//!
//! Seen from above, a wall is a thick segment with four faces:
//!
//! ```text
//!               ^ normal
//!               |
//!               |       face
//!   P1----------------------->P2
//!   |                          |
//!   P4------------------------P3
//! ```
//!
//! Face 0 is the front face (P1 -> P2). The other three follow clockwise,
//! each with its own outward normal.

use serde::{Deserialize, Serialize};

use super::vector::{Vector2D, VectorExt};
use crate::consts::*;

/// Stable wall index assigned by the simulation on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct WallId(pub u32);

/// One planar side of a wall
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Start point
    start: Vector2D,
    /// Outward unit normal
    normal: Vector2D,
    /// Direction and length from start
    face: Vector2D,
    end: Vector2D,
}

impl Face {
    pub fn new(start: Vector2D, normal: Vector2D, face: Vector2D) -> Self {
        Self {
            start,
            normal,
            face,
            end: start + face,
        }
    }

    pub fn position_vector(&self) -> Vector2D {
        self.start
    }

    pub fn normal_vector(&self) -> Vector2D {
        self.normal
    }

    pub fn face_vector(&self) -> Vector2D {
        self.face
    }

    pub fn face_end_vector(&self) -> Vector2D {
        self.end
    }

    /// Coordinates of one of the face endpoints
    pub fn endpoint(&self, end: FaceEnd) -> Vector2D {
        match end {
            FaceEnd::Start => self.start,
            FaceEnd::End => self.end,
        }
    }
}

/// Which endpoint of a face a corner contact hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceEnd {
    Start,
    End,
}

/// Hit bookkeeping for walls that break after enough impacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Durability {
    hits: u32,
    hits_to_destroy: u32,
    /// Opaque tag for the game layer (what happens when this wall breaks)
    pub action_code: i32,
}

impl Durability {
    pub fn new(hits_to_destroy: u32) -> Self {
        Self {
            hits: 0,
            hits_to_destroy: hits_to_destroy.max(1),
            action_code: 0,
        }
    }

    /// Count a hit; returns true once the wall is destroyed
    pub fn wall_was_hit(&mut self) -> bool {
        self.hits += 1;
        self.hits >= self.hits_to_destroy
    }

    /// 1.0 = never hit, 0.0 = destroyed
    pub fn wall_health(&self) -> f64 {
        let remaining = self.hits_to_destroy.saturating_sub(self.hits);
        remaining as f64 / self.hits_to_destroy as f64
    }

    pub fn reset_hits(&mut self) {
        self.hits = 0;
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn hits_to_destroy(&self) -> u32 {
        self.hits_to_destroy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WallKind {
    Solid,
    Destroyable(Durability),
}

/// A static rectangular obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub(crate) id: WallId,
    faces: [Face; 4],
    coords: [Vector2D; 4],
    thickness: f64,
    height: f64,
    /// Only the front face can be reached by any disk
    infinite: bool,
    kind: WallKind,
}

impl Wall {
    /// Create a wall from start, face (direction + length) and outward normal
    pub fn new(start: Vector2D, face: Vector2D, normal: Vector2D, thickness: f64, height: f64) -> Self {
        let face2 = normal * -thickness;
        let normal2 = face.normalized();

        let p1 = start;
        let p2 = p1 + face;
        let p3 = p2 + face2;
        let p4 = p3 - face;

        Self {
            id: WallId::default(),
            faces: [
                Face::new(p1, normal, face),
                Face::new(p2, normal2, face2),
                Face::new(p3, -normal, -face),
                Face::new(p4, -normal2, -face2),
            ],
            coords: [p1, p2, p3, p4],
            thickness,
            height,
            infinite: false,
            kind: WallKind::Solid,
        }
    }

    /// Wall from (x1, y1) to (x2, y2); the normal is the face turned 90° counter-clockwise
    pub fn between(x1: f64, y1: f64, x2: f64, y2: f64, thickness: f64, height: f64) -> Self {
        let face = Vector2D::new(x2 - x1, y2 - y1);
        Self::new(Vector2D::new(x1, y1), face, face.perp().normalized(), thickness, height)
    }

    /// Wall from (x1, y1) to (x2, y2) with default thickness and height
    pub fn segment(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::between(x1, y1, x2, y2, DEFAULT_WALL_THICKNESS, DEFAULT_WALL_HEIGHT)
    }

    /// Builder-style infinite flag
    pub fn infinite(mut self) -> Self {
        self.infinite = true;
        self
    }

    /// Builder-style conversion into a destroyable wall
    pub fn destroyable(mut self, hits_to_destroy: u32) -> Self {
        self.kind = WallKind::Destroyable(Durability::new(hits_to_destroy));
        self
    }

    pub fn id(&self) -> WallId {
        self.id
    }

    pub fn front_face(&self) -> &Face {
        &self.faces[0]
    }

    pub fn faces(&self) -> &[Face; 4] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> &Face {
        &self.faces[index]
    }

    /// Corner points P1..P4
    pub fn coords(&self) -> &[Vector2D; 4] {
        &self.coords
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    pub fn set_infinite(&mut self, infinite: bool) {
        self.infinite = infinite;
    }

    pub fn kind(&self) -> &WallKind {
        &self.kind
    }

    pub fn is_destroyable(&self) -> bool {
        matches!(self.kind, WallKind::Destroyable(_))
    }

    pub fn durability(&self) -> Option<&Durability> {
        match &self.kind {
            WallKind::Destroyable(d) => Some(d),
            WallKind::Solid => None,
        }
    }

    pub fn durability_mut(&mut self) -> Option<&mut Durability> {
        match &mut self.kind {
            WallKind::Destroyable(d) => Some(d),
            WallKind::Solid => None,
        }
    }
}

impl std::fmt::Display for Wall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "wall {} {} to {}, normal {}",
            self.id.0,
            self.coords[0],
            self.coords[1],
            self.faces[0].normal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faces_and_coords() {
        let wall = Wall::between(0.0, 0.0, 10.0, 0.0, 1.0, 1.0);
        let front = wall.front_face();
        assert_eq!(front.normal_vector(), Vector2D::new(0.0, 1.0));
        assert_eq!(front.face_end_vector(), Vector2D::new(10.0, 0.0));

        let coords = wall.coords();
        assert_eq!(coords[2], Vector2D::new(10.0, -1.0));
        assert_eq!(coords[3], Vector2D::new(0.0, -1.0));

        // side and back faces point away from the wall body
        assert_eq!(wall.face(1).normal_vector(), Vector2D::new(1.0, 0.0));
        assert_eq!(wall.face(2).normal_vector(), Vector2D::new(0.0, -1.0));
        assert_eq!(wall.face(3).normal_vector(), Vector2D::new(-1.0, 0.0));
        for face in wall.faces() {
            assert!((face.normal_vector().value() - 1.0).abs() < 1e-12);
            assert!(face.normal_vector().is_orthogonal(face.face_vector()));
        }
    }

    #[test]
    fn test_reversed_wall_normal() {
        let wall = Wall::segment(10.0, 0.0, 0.0, 0.0);
        assert_eq!(wall.front_face().normal_vector(), Vector2D::new(0.0, -1.0));
        assert_eq!(wall.thickness(), DEFAULT_WALL_THICKNESS);
    }

    #[test]
    fn test_destroyable_wall_health() {
        let mut wall = Wall::segment(0.0, 0.0, 1.0, 0.0).destroyable(2);
        assert!(wall.is_destroyable());
        let durability = wall.durability_mut().unwrap();
        assert_eq!(durability.wall_health(), 1.0);
        assert!(!durability.wall_was_hit());
        assert_eq!(durability.wall_health(), 0.5);
        assert!(durability.wall_was_hit());
        assert_eq!(durability.wall_health(), 0.0);
        durability.reset_hits();
        assert_eq!(durability.wall_health(), 1.0);
    }

    #[test]
    fn test_solid_wall_has_no_durability() {
        let wall = Wall::segment(0.0, 0.0, 1.0, 0.0).infinite();
        assert!(wall.is_infinite());
        assert!(wall.durability().is_none());
    }
}
