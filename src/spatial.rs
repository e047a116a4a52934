use glam::Vec3;

/// A marker position on the stage, in pixels, measured from the stage's
/// top-left corner to the marker's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinates {
    pub x: f32,
    pub y: f32,
}

impl Coordinates {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Maps stage pixels onto the floor plane of the audio scene.
///
/// The stage centre is the origin. Screen x runs along world +x and screen y
/// (downwards) along world +z, so the top of the stage is in front of a
/// listener standing at the origin. Height (world y) is always zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageMapping {
    pub width: f32,
    pub height: f32,
    pub pixels_per_unit: f32,
    pub marker_size: f32,
}

impl Default for StageMapping {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 420.0,
            pixels_per_unit: 120.0,
            marker_size: 28.0,
        }
    }
}

impl StageMapping {
    pub fn new(width: f32, height: f32, pixels_per_unit: f32) -> Self {
        Self {
            width,
            height,
            pixels_per_unit: pixels_per_unit.max(1.0),
            ..Default::default()
        }
    }

    pub fn to_world(&self, coordinates: Coordinates) -> Vec3 {
        let half_marker = self.marker_size / 2.0;
        let centre_x = coordinates.x + half_marker - self.width / 2.0;
        let centre_y = coordinates.y + half_marker - self.height / 2.0;

        Vec3::new(
            centre_x / self.pixels_per_unit,
            0.0,
            centre_y / self.pixels_per_unit,
        )
    }

    pub fn to_screen(&self, position: Vec3) -> Coordinates {
        let half_marker = self.marker_size / 2.0;
        Coordinates {
            x: position.x * self.pixels_per_unit + self.width / 2.0 - half_marker,
            y: position.z * self.pixels_per_unit + self.height / 2.0 - half_marker,
        }
    }

    /// Keeps the whole marker inside the stage.
    pub fn clamp(&self, coordinates: Coordinates) -> Coordinates {
        let max_x = (self.width - self.marker_size).max(0.0);
        let max_y = (self.height - self.marker_size).max(0.0);
        Coordinates {
            x: coordinates.x.clamp(0.0, max_x),
            y: coordinates.y.clamp(0.0, max_y),
        }
    }
}

/// Where the listener stands, and how far apart their ears are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerPose {
    pub position: Vec3,
    pub ear_spacing: f32,
}

impl Default for ListenerPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            ear_spacing: 2.0,
        }
    }
}

impl ListenerPose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn left_ear(&self) -> Vec3 {
        self.position - Vec3::X * (self.ear_spacing / 2.0)
    }

    pub fn right_ear(&self) -> Vec3 {
        self.position + Vec3::X * (self.ear_spacing / 2.0)
    }
}

/// Floor position `[x, z]` as written in arrangement manifests.
pub fn floor_position(position: [f32; 2]) -> Vec3 {
    Vec3::new(position[0], 0.0, position[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_centred_marker_is_origin() {
        let mapping = StageMapping::new(600.0, 400.0, 100.0);
        let half = mapping.marker_size / 2.0;
        let centred = Coordinates::new(300.0 - half, 200.0 - half);
        assert!(approx(mapping.to_world(centred), Vec3::ZERO));
    }

    #[test]
    fn test_screen_axes() {
        let mapping = StageMapping::new(600.0, 400.0, 100.0);
        let origin = mapping.to_screen(Vec3::ZERO);

        let right = mapping.to_world(Coordinates::new(origin.x + 100.0, origin.y));
        assert!(approx(right, Vec3::new(1.0, 0.0, 0.0)));

        let up = mapping.to_world(Coordinates::new(origin.x, origin.y - 50.0));
        assert!(approx(up, Vec3::new(0.0, 0.0, -0.5)));
    }

    #[test]
    fn test_to_screen_inverts_to_world() {
        let mapping = StageMapping::default();
        let position = Vec3::new(-1.25, 0.0, 0.75);
        assert!(approx(mapping.to_world(mapping.to_screen(position)), position));
    }

    #[test]
    fn test_clamp_keeps_marker_on_stage() {
        let mapping = StageMapping::new(200.0, 100.0, 50.0);
        let clamped = mapping.clamp(Coordinates::new(-20.0, 500.0));
        assert_eq!(clamped, Coordinates::new(0.0, 100.0 - mapping.marker_size));
    }

    #[test]
    fn test_listener_ears() {
        let listener = ListenerPose::at(Vec3::new(1.0, 0.0, 2.0));
        assert!(approx(listener.left_ear(), Vec3::new(0.0, 0.0, 2.0)));
        assert!(approx(listener.right_ear(), Vec3::new(2.0, 0.0, 2.0)));
    }
}
