//! Declarative macros shared across the crate.

/// Build [`ProcedureParams`](crate::models::ProcedureParams) from
/// `name => value` pairs, keeping their order.
///
/// # Example
///
/// ```ignore
/// let params = params! { "id" => 1, "name" => "Ada" };
/// client.execute("UpdateUser", Some(params)).await?;
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::models::ProcedureParams::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::models::ProcedureParams::new()$(.with($name, $value))+
    };
}
