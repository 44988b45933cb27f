use tracing::{info, warn};

use crate::error::TextureError;

/// Decoded RGBA8 image, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    /// 1x1 white, used for untextured materials and failed loads
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TextureError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            rgba: image.into_raw(),
        })
    }

    /// Unwrap a load result, logging the failure and substituting white
    pub fn or_white(result: Result<Self, TextureError>, path: &str) -> Self {
        match result {
            Ok(image) => {
                info!(path, width = image.width, height = image.height, "texture loaded");
                image
            }
            Err(e) => {
                warn!(path, error = %e, "texture unavailable, rendering untextured");
                Self::white()
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub const ASSETS_VAR: &str = "LUNABALL_ASSETS";

/// Directory textures are read from natively (`LUNABALL_ASSETS`, default `assets`)
#[cfg(not(target_arch = "wasm32"))]
pub fn asset_root() -> std::path::PathBuf {
    std::env::var(ASSETS_VAR)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("assets"))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn load_file(root: &std::path::Path, relative: &str) -> Result<TextureImage, TextureError> {
    let path = root.join(relative);
    let bytes = std::fs::read(&path).map_err(|source| TextureError::Io { path, source })?;
    TextureImage::decode(&bytes)
}

/// Fetch a texture relative to the page URL
#[cfg(target_arch = "wasm32")]
pub async fn fetch(relative: &str) -> Result<TextureImage, TextureError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let fail = |reason: String| TextureError::Fetch {
        path: relative.to_string(),
        reason,
    };

    let window = web_sys::window().ok_or_else(|| fail("no global `window`".into()))?;
    let response = JsFuture::from(window.fetch_with_str(relative))
        .await
        .map_err(|e| fail(format!("{e:?}")))?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| fail("fetch did not return a Response".into()))?;
    if !response.ok() {
        return Err(fail(format!("HTTP {}", response.status())));
    }
    let buffer = response.array_buffer().map_err(|e| fail(format!("{e:?}")))?;
    let buffer = JsFuture::from(buffer).await.map_err(|e| fail(format!("{e:?}")))?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    TextureImage::decode(&bytes)
}

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, image: &TextureImage, label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self { texture, view, sampler }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png() {
        let mut pixels = image::RgbaImage::new(2, 1);
        pixels.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        pixels.put_pixel(1, 0, image::Rgba([0, 0, 255, 128]));
        let mut encoded = std::io::Cursor::new(Vec::new());
        pixels.write_to(&mut encoded, image::ImageFormat::Png).unwrap();

        let decoded = TextureImage::decode(encoded.get_ref()).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
        assert_eq!(decoded.rgba, vec![255, 0, 0, 255, 0, 0, 255, 128]);
    }

    #[test]
    fn test_garbage_falls_back_to_white() {
        let result = TextureImage::decode(b"definitely not a jpeg");
        assert!(matches!(result, Err(TextureError::Decode(_))));
        assert_eq!(TextureImage::or_white(result, "img/moon_map.jpg"), TextureImage::white());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let root = std::env::temp_dir().join("lunaball-no-such-assets");
        let result = load_file(&root, "img/moon_map.jpg");
        assert!(matches!(result, Err(TextureError::Io { .. })));
    }
}
