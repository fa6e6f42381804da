use std::time::Duration;

use image::RgbaImage;

use crate::core::error::{IndexError, IndexResult};

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Checks that the buffer holds exactly `width * height` RGBA pixels.
    pub fn validate(&self) -> IndexResult<()> {
        let expected = self.pixel_count() * 4;
        if self.data.len() != expected {
            return Err(IndexError::InvalidFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                self.width,
                self.height,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// 灰度化（BT.601 整数权重）
    pub fn to_gray(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .map(|rgba| {
                ((rgba[0] as u32 * 299 + rgba[1] as u32 * 587 + rgba[2] as u32 * 114) / 1000) as u8
            })
            .collect()
    }

    fn to_image(&self) -> IndexResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            IndexError::InvalidFrame(format!(
                "buffer of {} bytes does not fit {}x{}",
                self.data.len(),
                self.width,
                self.height
            ))
        })
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> IndexResult<Frame> {
        let img = self.to_image()?;
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Ok(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        })
    }

    /// 裁剪出检测区域，区域必须完全落在帧内
    pub fn crop(&self, region: &Region) -> IndexResult<Frame> {
        if region.is_empty() {
            return Err(IndexError::RegionOutOfBounds(format!("{:?} is empty", region)));
        }
        if region.right() > self.width || region.bottom() > self.height {
            return Err(IndexError::RegionOutOfBounds(format!(
                "{:?} exceeds {}x{} frame",
                region, self.width, self.height
            )));
        }

        let img = self.to_image()?;
        let cropped =
            image::imageops::crop_imm(&img, region.x, region.y, region.width, region.height)
                .to_image();

        Ok(Frame {
            width: region.width,
            height: region.height,
            data: cropped.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        })
    }
}

/// 帧内的矩形检测区域（行人框）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// 严格包含于 `outer` 内部（四边都不接触）
    pub fn is_inside(&self, outer: &Region) -> bool {
        self.x > outer.x
            && self.y > outer.y
            && self.right() < outer.right()
            && self.bottom() < outer.bottom()
    }

    /// Clips the region to a `width x height` frame. Returns `None` when nothing is left.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Region> {
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        if self.x >= right || self.y >= bottom {
            return None;
        }
        Some(Region::new(self.x, self.y, right - self.x, bottom - self.y))
    }
}
