use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        // a huge page just reads past the end
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

// Query strings are flat; `#[serde(flatten)]` would lose number parsing here.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub is_paid: Option<bool>,
    pub is_delivered: Option<bool>,
    /// Newest first unless `asc`.
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(Pagination::default().normalize(), (1, 20, 0));

        let page = Pagination {
            page: Some(-4),
            per_page: Some(1_000),
        };
        assert_eq!(page.normalize(), (1, 100, 0));

        let page = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(page.normalize(), (3, 10, 20));
    }

    #[test]
    fn huge_page_saturates_the_offset() {
        let page = Pagination {
            page: Some(i64::MAX),
            per_page: Some(100),
        };
        assert_eq!(page.normalize(), (i64::MAX, 100, i64::MAX));
    }
}
