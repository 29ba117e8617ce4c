use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, vec2};

const GROUP_PALETTE: [Color32; 10] = [
    Color32::from_rgb(0x3b, 0x82, 0xf6),
    Color32::from_rgb(0xef, 0x44, 0x44),
    Color32::from_rgb(0x10, 0xb9, 0x81),
    Color32::from_rgb(0xf5, 0x9e, 0x0b),
    Color32::from_rgb(0x8b, 0x5c, 0xf6),
    Color32::from_rgb(0xec, 0x48, 0x99),
    Color32::from_rgb(0x06, 0xb6, 0xd4),
    Color32::from_rgb(0x84, 0xcc, 0x16),
    Color32::from_rgb(0xf9, 0x73, 0x16),
    Color32::from_rgb(0x63, 0x66, 0xf1),
];

pub(super) fn group_color(group: u32) -> Color32 {
    let len = GROUP_PALETTE.len();
    GROUP_PALETTE[(group as usize % len + len - 1) % len]
}

pub(super) fn node_radius(normalized_degree: f32) -> f32 {
    6.0 + normalized_degree.clamp(0.0, 1.0) * 8.0
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let mix = |from: u8, to: u8| (from as f32 + (to as f32 - from as f32) * amount) as u8;
    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    let scale = |channel: u8| (channel as f32 * factor) as u8;
    Color32::from_rgba_unmultiplied(
        scale(color.r()),
        scale(color.g()),
        scale(color.b()),
        (color.a() as f32 * (0.45 + factor * 0.55)) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(9, 9, 11));

    let step = (48.0 * zoom.clamp(0.5, 2.0)).max(16.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(63, 63, 70, 60));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }
    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

pub(super) fn draw_arrow(
    painter: &Painter,
    start: Pos2,
    end: Pos2,
    target_radius: f32,
    head: f32,
    stroke: Stroke,
) {
    let delta = end - start;
    let length = delta.length();
    if length <= target_radius + head {
        return;
    }
    let direction = delta / length;
    let tip = end - direction * target_radius;
    let back = tip - direction * head;
    let side = vec2(-direction.y, direction.x) * (head * 0.5);

    painter.line_segment([start, back], stroke);
    painter.add(eframe::egui::Shape::convex_polygon(
        vec![tip, back + side, back - side],
        stroke.color,
        Stroke::NONE,
    ));
}

pub(super) fn distance_to_segment(point: Pos2, start: Pos2, end: Pos2) -> f32 {
    let segment = end - start;
    let length_sq = segment.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0);
    point.distance(start + segment * t)
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}
