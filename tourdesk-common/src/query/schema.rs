//! Static field declarations per resource
//!
//! The schema is the allow-list for everything a client may name in a query:
//! filters resolve against non-hidden fields, sort and projection against all
//! declared fields. Column names in generated SQL only ever come from here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
    /// JSON array stored as text
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Name used in the API (camelCase)
    pub name: &'static str,
    /// Column name in the table
    pub column: &'static str,
    pub ty: FieldType,
    /// Excluded from the default projection and from filtering
    pub hidden: bool,
}

const fn field(name: &'static str, column: &'static str, ty: FieldType) -> FieldDef {
    FieldDef {
        name,
        column,
        ty,
        hidden: false,
    }
}

const fn hidden(name: &'static str, column: &'static str, ty: FieldType) -> FieldDef {
    FieldDef {
        name,
        column,
        ty,
        hidden: true,
    }
}

#[derive(Debug)]
pub struct ResourceSchema {
    /// Plural name, used as the envelope key (`data.tours`)
    pub collection: &'static str,
    /// Singular name, used as the envelope key for single documents
    pub document: &'static str,
    pub table: &'static str,
    /// First entry is always the id field
    pub fields: &'static [FieldDef],
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field usable in a client filter
    pub fn filterable(&self, name: &str) -> Option<&FieldDef> {
        self.field(name).filter(|f| !f.hidden)
    }

    pub fn id_field(&self) -> &FieldDef {
        &self.fields[0]
    }

    pub fn default_projection(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| !f.hidden).collect()
    }
}

pub static TOURS: ResourceSchema = ResourceSchema {
    collection: "tours",
    document: "tour",
    table: "tours",
    fields: &[
        field("id", "guid", FieldType::Text),
        field("name", "name", FieldType::Text),
        field("duration", "duration", FieldType::Integer),
        field("maxGroupSize", "max_group_size", FieldType::Integer),
        field("difficulty", "difficulty", FieldType::Text),
        field("ratingsAverage", "ratings_average", FieldType::Real),
        field("ratingsQuantity", "ratings_quantity", FieldType::Integer),
        field("price", "price", FieldType::Real),
        field("priceDiscount", "price_discount", FieldType::Real),
        field("summary", "summary", FieldType::Text),
        field("description", "description", FieldType::Text),
        field("imageCover", "image_cover", FieldType::Text),
        field("images", "images", FieldType::List),
        field("startDates", "start_dates", FieldType::List),
        field("createdAt", "created_at", FieldType::Timestamp),
        field("updatedAt", "updated_at", FieldType::Timestamp),
        hidden("version", "version", FieldType::Integer),
    ],
};

pub static REVIEWS: ResourceSchema = ResourceSchema {
    collection: "reviews",
    document: "review",
    table: "reviews",
    fields: &[
        field("id", "guid", FieldType::Text),
        field("review", "review", FieldType::Text),
        field("rating", "rating", FieldType::Integer),
        field("tourId", "tour_id", FieldType::Text),
        field("userId", "user_id", FieldType::Text),
        field("createdAt", "created_at", FieldType::Timestamp),
        field("updatedAt", "updated_at", FieldType::Timestamp),
        hidden("version", "version", FieldType::Integer),
    ],
};

pub static USERS: ResourceSchema = ResourceSchema {
    collection: "users",
    document: "user",
    table: "users",
    fields: &[
        field("id", "guid", FieldType::Text),
        field("name", "name", FieldType::Text),
        field("email", "email", FieldType::Text),
        field("role", "role", FieldType::Text),
        field("photo", "photo", FieldType::Text),
        field("createdAt", "created_at", FieldType::Timestamp),
        field("updatedAt", "updated_at", FieldType::Timestamp),
        hidden("active", "active", FieldType::Boolean),
        hidden("version", "version", FieldType::Integer),
    ],
};
