use glam::{Mat4, Vec3};
use std::ops::{Add, AddAssign};

/// Axis aligned box. A freshly initialised box is invalid (empty) and becomes
/// valid as soon as something is added to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
    valid: bool,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
        valid: false,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
            valid: true,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for point in points {
            aabb.add_point(point);
        }
        aabb
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn add_point(&mut self, point: Vec3) {
        if self.valid {
            self.min = self.min.min(point);
            self.max = self.max.max(point);
        } else {
            *self = Self::new(point, point);
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing all eight transformed corners.
    pub fn transform_by(&self, matrix: Mat4) -> Self {
        if !self.valid {
            return Self::EMPTY;
        }
        Self::from_points(self.corners().map(|c| matrix.transform_point3(c)))
    }

    /// An invalid box is contained by everything and contains nothing.
    pub fn contains(&self, other: &Aabb) -> bool {
        if !other.valid {
            return true;
        }
        self.valid && self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }
}

impl AddAssign for Aabb {
    fn add_assign(&mut self, rhs: Self) {
        if !rhs.valid {
            return;
        }
        if self.valid {
            self.min = self.min.min(rhs.min);
            self.max = self.max.max(rhs.max);
        } else {
            *self = rhs;
        }
    }
}

impl Add for Aabb {
    type Output = Aabb;

    fn add(mut self, rhs: Self) -> Aabb {
        self += rhs;
        self
    }
}

/// Box plus bounding sphere sharing one origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxSphereBounds {
    pub origin: Vec3,
    pub box_extent: Vec3,
    pub sphere_radius: f32,
}

impl Default for BoxSphereBounds {
    fn default() -> Self {
        Self::ZERO
    }
}

impl BoxSphereBounds {
    pub const ZERO: Self = Self {
        origin: Vec3::ZERO,
        box_extent: Vec3::ZERO,
        sphere_radius: 0.0,
    };

    /// Falls back to zero bounds for an invalid box.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        if !aabb.is_valid() {
            return Self::ZERO;
        }
        let box_extent = aabb.extent();
        Self {
            origin: aabb.center(),
            box_extent,
            sphere_radius: box_extent.length(),
        }
    }

    pub fn to_aabb(&self) -> Aabb {
        Aabb::new(self.origin - self.box_extent, self.origin + self.box_extent)
    }

    pub fn transform_by(&self, matrix: Mat4) -> Self {
        let transformed = Self::from_aabb(&self.to_aabb().transform_by(matrix));
        let (scale, _, _) = matrix.to_scale_rotation_translation();
        Self {
            sphere_radius: transformed
                .sphere_radius
                .min(self.sphere_radius * scale.abs().max_element()),
            ..transformed
        }
    }

    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            origin: self.origin,
            box_extent: self.box_extent * scale,
            sphere_radius: self.sphere_radius * scale,
        }
    }
}
