use egui::{pos2, Color32, Rect, Sense, Ui, Vec2};

pub const VISUALIZER_HEIGHT: f32 = 100.0;

/// Fraction of the full height each bar should reach. Byte readouts span
/// 0-255, so a full-scale bin draws a full-height bar.
pub fn bar_heights(bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
    bytes.iter().map(|&b| b as f32 / 255.0)
}

/// Draws one bar per frequency bin across the available width.
pub fn bar_graph(ui: &mut Ui, bytes: &[u8], color: Color32) {
    let size = Vec2::new(ui.available_width(), VISUALIZER_HEIGHT);
    let (rect, _) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter_at(rect);

    painter.rect_filled(rect, 2.0, Color32::from_gray(18));
    if bytes.is_empty() {
        return;
    }

    let bar_width = rect.width() / bytes.len() as f32;
    for (i, amplitude) in bar_heights(bytes).enumerate() {
        if amplitude <= 0.0 {
            continue;
        }
        let left = rect.left() + i as f32 * bar_width;
        let top = rect.bottom() - amplitude * rect.height();
        painter.rect_filled(
            Rect::from_min_max(pos2(left, top), pos2(left + bar_width.max(1.0), rect.bottom())),
            0.0,
            color,
        );
    }
}
