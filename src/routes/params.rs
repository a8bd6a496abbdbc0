use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let size = self.size.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * size;
        (page, size, offset)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NearbyQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Radius such as `10km` or a bare number of kilometres.
    pub radius: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub q: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_and_offsets() {
        let p = Pagination {
            page: Some(3),
            size: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));

        let defaults = Pagination {
            page: None,
            size: None,
        };
        assert_eq!(defaults.normalize(), (1, 20, 0));

        let wild = Pagination {
            page: Some(-4),
            size: Some(10_000),
        };
        assert_eq!(wild.normalize(), (1, 100, 0));
    }
}
