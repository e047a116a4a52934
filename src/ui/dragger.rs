pub use crate::spatial::Coordinates;

type PositionCallback = Box<dyn FnMut(Coordinates)>;

/// A draggable stage marker.
///
/// Holds no rendering state of its own: the UI feeds it pointer presses,
/// moves and releases, and reads back `coordinates()` and `label()` to draw it.
pub struct Dragger {
    coordinates: Coordinates,
    label: String,
    dragging: bool,
    // Where inside the marker the pointer grabbed it.
    offset: Coordinates,
    position_callback: Option<PositionCallback>,
}

impl Dragger {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            label: String::new(),
            dragging: false,
            offset: Coordinates::default(),
            position_callback: None,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn grab_offset(&self) -> Coordinates {
        self.offset
    }

    pub fn update_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Stores the callback and immediately reports the current position.
    pub fn register_update(&mut self, callback: impl FnMut(Coordinates) + 'static) {
        let mut callback: PositionCallback = Box::new(callback);
        callback(self.coordinates);
        self.position_callback = Some(callback);
    }

    pub fn apply_coordinates(&mut self, x: f32, y: f32) {
        self.coordinates = Coordinates { x, y };
        if let Some(callback) = &mut self.position_callback {
            callback(self.coordinates);
        }
    }

    pub fn hit_test(&self, x: f32, y: f32, size: f32) -> bool {
        x >= self.coordinates.x
            && x <= self.coordinates.x + size
            && y >= self.coordinates.y
            && y <= self.coordinates.y + size
    }

    /// Begins a drag. `offset_x`/`offset_y` are relative to the marker's corner.
    pub fn press(&mut self, offset_x: f32, offset_y: f32) {
        self.dragging = true;
        self.offset = Coordinates {
            x: offset_x,
            y: offset_y,
        };
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        if self.dragging {
            self.apply_coordinates(x - self.offset.x, y - self.offset.y);
        }
    }

    pub fn release(&mut self, x: f32, y: f32) {
        if self.dragging {
            self.apply_coordinates(x - self.offset.x, y - self.offset.y);
            self.dragging = false;
        }
    }
}
