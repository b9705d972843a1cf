//! 请求内容摘要
//!
//! 幂等检查使用的 request hash：规范 JSON 的 SHA-256，base64url 无填充。
//! 结构体按字段声明顺序序列化，`serde_json::Value` 对象按键排序，因此
//! 相同内容总是得到相同摘要。

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// 计算请求载荷的规范摘要
pub fn hash_request_canonical<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(payload)?;
    let digest = Sha256::digest(&canonical);
    Ok(URL_SAFE_NO_PAD.encode(digest))
}
