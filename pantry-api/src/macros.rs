//! Declarative macros for the Pantry API.

/// Implement `FromRef<AppState>` for a cloneable field so handlers can
/// extract it directly with `State<T>`.
///
/// ```ignore
/// impl_from_ref!(Arc<dyn Store>, store);
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
