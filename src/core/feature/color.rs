//! 颜色空间转换（8 位，输入为 RGB 像素）
//!
//! Output ranges follow the 8-bit conventions the reduction models were trained
//! on: hue is halved into 0..180, every other channel spans 0..=255, and the
//! signed Lab / chroma channels are offset by 128.

use once_cell::sync::Lazy;

/// sRGB 8 位值到线性光强的查找表
static SRGB_TO_LINEAR: Lazy<[f32; 256]> = Lazy::new(|| {
    std::array::from_fn(|i| {
        let c = i as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    })
});

// D65 白点
const XN: f32 = 0.950456;
const ZN: f32 = 1.088754;
const LAB_EPSILON: f32 = 0.008856;

/// 四种颜色空间，顺序即特征拼接顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Native channels, read in B, G, R order.
    Native,
    Hsv,
    YCrCb,
    Lab,
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 4] = [
        ColorSpace::Native,
        ColorSpace::Hsv,
        ColorSpace::YCrCb,
        ColorSpace::Lab,
    ];

    /// 各通道直方图取值范围 [low, high)
    pub fn channel_ranges(self) -> [(f32, f32); 3] {
        match self {
            ColorSpace::Hsv => [(0.0, 180.0), (0.0, 255.0), (0.0, 255.0)],
            _ => [(0.0, 255.0); 3],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorSpace::Native => "bgr",
            ColorSpace::Hsv => "hsv",
            ColorSpace::YCrCb => "ycrcb",
            ColorSpace::Lab => "lab",
        }
    }

    pub fn convert(self, rgb: [u8; 3]) -> [u8; 3] {
        match self {
            ColorSpace::Native => [rgb[2], rgb[1], rgb[0]],
            ColorSpace::Hsv => rgb_to_hsv(rgb),
            ColorSpace::YCrCb => rgb_to_ycrcb(rgb),
            ColorSpace::Lab => rgb_to_lab(rgb),
        }
    }
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let v = r.max(g).max(b);
    let diff = v - r.min(g).min(b);

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let mut h = (h / 2.0).round() as u32;
    if h >= 180 {
        h -= 180;
    }

    [h as u8, to_u8(s), to_u8(v)]
}

fn rgb_to_ycrcb([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cr = (r - y) * 0.713 + 128.0;
    let cb = (b - y) * 0.564 + 128.0;
    [to_u8(y), to_u8(cr), to_u8(cb)]
}

fn rgb_to_lab([r, g, b]: [u8; 3]) -> [u8; 3] {
    let lut = &*SRGB_TO_LINEAR;
    let (r, g, b) = (lut[r as usize], lut[g as usize], lut[b as usize]);

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / XN;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / ZN;

    let f = |t: f32| {
        if t > LAB_EPSILON {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };
    let (fx, fy, fz) = (f(x), f(y), f(z));

    let l = if y > LAB_EPSILON {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);

    [to_u8(l * 255.0 / 100.0), to_u8(a + 128.0), to_u8(bb + 128.0)]
}
