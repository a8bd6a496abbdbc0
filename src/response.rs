use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, size: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            size: None,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let resp = ApiResponse::success("OK", serde_json::json!({"id": 1}), None);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "OK");
        assert_eq!(json["data"]["id"], 1);
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn meta_is_included_when_present() {
        let resp = ApiResponse::success("OK", 42, Some(Meta::new(2, 20, 55)));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["meta"]["page"], 2);
        assert_eq!(json["meta"]["total"], 55);
    }
}
