// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative helpers shared across the workspace.

/// `Display` for a fieldless enum, one string literal per variant.
///
/// ```ignore
/// nbr_core::simple_display! {
///     RuntimeStatus {
///         Creating => "creating",
///         Running => "running",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident => $label:literal ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let label = match self {
                    $( Self::$variant => $label, )+
                };
                f.write_str(label)
            }
        }
    };
}

/// Builder-style setters, expanded inside an `impl` block.
///
/// Groups may appear in any order and repeat:
/// `into` takes `impl Into<T>`, `set` takes `T`, and `option` fills an
/// `Option<T>` field from `impl Into<T>`.
///
/// ```ignore
/// impl EngineConfig {
///     nbr_core::setters! {
///         into { default_environment: String }
///         set { poll_interval: Duration }
///         option { default_credits: f64 }
///     }
/// }
/// ```
#[macro_export]
macro_rules! setters {
    () => {};
    (into { $( $field:ident : $ty:ty ),* $(,)? } $($rest:tt)*) => {
        $(
            pub fn $field(mut self, value: impl Into<$ty>) -> Self {
                self.$field = value.into();
                self
            }
        )*
        $crate::setters! { $($rest)* }
    };
    (set { $( $field:ident : $ty:ty ),* $(,)? } $($rest:tt)*) => {
        $(
            pub fn $field(mut self, value: $ty) -> Self {
                self.$field = value;
                self
            }
        )*
        $crate::setters! { $($rest)* }
    };
    (option { $( $field:ident : $ty:ty ),* $(,)? } $($rest:tt)*) => {
        $(
            pub fn $field(mut self, value: impl Into<$ty>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
        $crate::setters! { $($rest)* }
    };
}
