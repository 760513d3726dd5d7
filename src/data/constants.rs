pub const SURROGATE_KEY: &str = "$key"; // Assigned by the collection engine on insert

pub const DEFAULT_ID_ATTR: &str = "id";

pub mod op {
    pub const EQ: &str = "$eq";
    pub const NE: &str = "$ne";
    pub const GT: &str = "$gt";
    pub const GTE: &str = "$gte";
    pub const LT: &str = "$lt";
    pub const LTE: &str = "$lte";
    pub const IN: &str = "$in";
    pub const NIN: &str = "$nin";
    pub const CONTAINS: &str = "$contains";
    pub const EXISTS: &str = "$exists";

    pub const AND: &str = "$and";
    pub const OR: &str = "$or";
}
