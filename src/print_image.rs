use ndarray::Array3;

/// Renders an RGB tensor with values in `[0, 1]` as 24-bit colored terminal blocks.
/// Every `stride`-th pixel is drawn, so large images still fit on screen.
pub fn render_image(image: &Array3<f64>, stride: usize) -> String {
    let stride = stride.max(1);
    let (height, width, _) = image.dim();
    let mut out = String::new();
    for i in (0..height).step_by(stride) {
        for j in (0..width).step_by(stride) {
            let [r, g, b] = [0, 1, 2].map(|c| to_level(image[[i, j, c]]));
            out.push_str(&format!("\x1b[48;2;{};{};{}m  \x1b[0m", r, g, b));
        }
        out.push('\n');
    }
    out
}

pub fn print_image(image: &Array3<f64>, stride: usize) {
    print!("{}", render_image(image, stride));
}

fn to_level(value: f64) -> u8 {
    // NaN renders as black
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    (255.0 * value).round() as u8
}
