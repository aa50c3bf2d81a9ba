use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, routes::business::ImageColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Logo,
    Cover,
    Gallery,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Logo => "logo",
            ImageType::Cover => "cover",
            ImageType::Gallery => "gallery",
        }
    }

    /// logo 和 cover 会回写到商家资料
    pub fn profile_column(&self) -> Option<ImageColumn> {
        match self {
            ImageType::Logo => Some(ImageColumn::Logo),
            ImageType::Cover => Some(ImageColumn::Cover),
            ImageType::Gallery => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageMime {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Webp => "image/webp",
            ImageMime::Gif => "image/gif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageMime::Png => "png",
            ImageMime::Jpeg => "jpg",
            ImageMime::Webp => "webp",
            ImageMime::Gif => "gif",
        }
    }

    pub fn from_content_type(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageMime::Png),
            "image/jpeg" | "image/jpg" => Some(ImageMime::Jpeg),
            "image/webp" => Some(ImageMime::Webp),
            "image/gif" => Some(ImageMime::Gif),
            _ => None,
        }
    }

    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageMime::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageMime::Jpeg)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageMime::Webp)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageMime::Gif)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadImageRequest {
    pub business_id: Uuid,
    pub image_type: ImageType,
    pub file_name: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadImageResponse {
    pub url: String,
    pub path: String,
    pub image_type: ImageType,
    pub content_type: &'static str,
    pub size_bytes: usize,
}

#[derive(Debug)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime: ImageMime,
}

/// 解析 base64 或 data URL，限制解码后的大小并校验图片格式
pub fn decode_image(data: &str, max_bytes: usize) -> Result<DecodedImage, AppError> {
    let data = data.trim();
    let (declared, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| AppError::Validation("malformed data URL".into()))?;
            let mime = header.strip_suffix(";base64").ok_or_else(|| {
                AppError::Validation("data URL must be base64 encoded".into())
            })?;
            let mime = ImageMime::from_content_type(mime).ok_or_else(|| {
                AppError::Validation(format!("unsupported image type: {}", mime))
            })?;
            (Some(mime), payload)
        }
        None => (None, data),
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(AppError::Validation("image data is empty".into()));
    }
    // 解码前按 base64 长度估算，避免为超大内容分配内存
    if cleaned.len() / 4 * 3 > max_bytes + 2 {
        return Err(AppError::PayloadTooLarge(format!(
            "image exceeds the {} byte limit",
            max_bytes
        )));
    }

    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| AppError::Validation(format!("invalid base64 image data: {}", e)))?;
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "image exceeds the {} byte limit",
            max_bytes
        )));
    }

    let sniffed = ImageMime::sniff(&bytes)
        .ok_or_else(|| AppError::Validation("unsupported or corrupt image data".into()))?;
    if let Some(declared) = declared {
        if declared != sniffed {
            return Err(AppError::Validation(format!(
                "declared type {} does not match image content {}",
                declared.content_type(),
                sniffed.content_type()
            )));
        }
    }

    Ok(DecodedImage {
        bytes,
        mime: sniffed,
    })
}

pub fn object_path(business_id: Uuid, image_type: ImageType, mime: ImageMime) -> String {
    format!(
        "{}/{}-{}.{}",
        business_id,
        image_type.as_str(),
        Uuid::new_v4(),
        mime.extension()
    )
}
