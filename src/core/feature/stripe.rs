use std::ops::Range;

pub const BAND_COUNT: usize = 6;

/// 水平条带掩膜：选中区域内 `rows` 范围的整行像素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandMask {
    pub rows: Range<u32>,
    pub width: u32,
}

impl BandMask {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && self.rows.contains(&y)
    }

    pub fn row_count(&self) -> u32 {
        self.rows.end - self.rows.start
    }
}

/// 把 `width x height` 的行人图片分成 6 个水平条带
///
/// Bands 0..5 are `height / 6` rows each; band 5 also takes the rows lost to
/// integer division, so it can be up to 5 rows taller than the others.
pub fn make_band_masks(width: u32, height: u32) -> [BandMask; BAND_COUNT] {
    let step = height / BAND_COUNT as u32;
    std::array::from_fn(|idx| {
        let start = step * idx as u32;
        let end = if idx == BAND_COUNT - 1 {
            height
        } else {
            step * (idx as u32 + 1)
        };
        BandMask {
            rows: start..end,
            width,
        }
    })
}
