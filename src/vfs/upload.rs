use crate::vfs::model::VfsError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// 解码后的上传内容
#[derive(Debug)]
pub struct DecodedUpload {
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// 解析 `data:<mime>;base64,<payload>`，也接受纯 base64 字符串。
///
/// 解码前先按 base64 长度估算大小，超过 `limit` 直接拒绝。
pub fn decode_data_url(raw: &str, limit: usize) -> Result<DecodedUpload, VfsError> {
    let raw = raw.trim();
    let (mime_type, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| VfsError::InvalidInput("dataUrl 缺少数据部分".to_string()))?;
            let mut parts = header.split(';');
            let mime = parts.next().filter(|m| !m.is_empty()).map(str::to_string);
            if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
                return Err(VfsError::InvalidInput(
                    "dataUrl 必须使用 base64 编码".to_string(),
                ));
            }
            (mime, payload)
        }
        None => (None, raw),
    };

    let estimated = payload.len() / 4 * 3;
    if estimated > limit + 2 {
        return Err(VfsError::PayloadTooLarge {
            size: estimated,
            limit,
        });
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| VfsError::InvalidInput(format!("base64 解码失败: {}", e)))?;
    if bytes.len() > limit {
        return Err(VfsError::PayloadTooLarge {
            size: bytes.len(),
            limit,
        });
    }

    Ok(DecodedUpload { mime_type, bytes })
}
