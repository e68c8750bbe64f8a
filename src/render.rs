use crate::color::Rgba8;
use crate::error::{PromoreelError, PromoreelResult};

/// A finished frame read back from the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

/// CPU raster surface owned by one render at a time.
pub struct Surface {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> PromoreelResult<Self> {
        if width == 0 || height == 0 {
            return Err(PromoreelError::surface_unavailable(
                "surface width/height must be non-zero",
            ));
        }
        let w: u16 = width
            .try_into()
            .map_err(|_| PromoreelError::surface_unavailable("surface width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| PromoreelError::surface_unavailable("surface height exceeds u16"))?;

        Ok(Self {
            width: w,
            height: h,
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    /// Fill every pixel with `color` (stored premultiplied).
    pub fn clear(&mut self, color: Rgba8) {
        let premul = color.to_premul();
        for px in self.pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
    }

    /// Raw premultiplied RGBA8 bytes, row-major.
    pub fn pixel_bytes_mut(&mut self) -> &mut [u8] {
        self.pixmap.data_as_u8_slice_mut()
    }

    /// Run one vector draw pass and composite it over the current content.
    pub fn run_pass(
        &mut self,
        draw: impl FnOnce(&mut vello_cpu::RenderContext) -> PromoreelResult<()>,
    ) -> PromoreelResult<()> {
        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        draw(&mut ctx)?;
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);
        Ok(())
    }

    /// Read the surface back as a frame.
    pub fn to_frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.width(),
            height: self.height(),
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }
}
