use crate::api::FieldDescriptor;

/// `SELECT <fields> FROM <object> WHERE CreatedDate = LAST_N_YEARS:<years>`
pub fn records_created_within(object: &str, fields: &[&str], years: u32) -> String {
    format!(
        "SELECT {} FROM {} WHERE CreatedDate = LAST_N_YEARS:{}",
        fields.join(","),
        object,
        years
    )
}

/// Salesforce API names are letters, digits and underscores, starting with a letter
pub fn is_valid_object_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Names of the fields a bulk query may select, in describe order
pub fn queryable_fields(fields: &[FieldDescriptor]) -> Vec<&str> {
    fields
        .iter()
        .filter(|f| f.is_bulk_queryable())
        .map(|f| f.name.as_str())
        .collect()
}
