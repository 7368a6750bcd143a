//! macros used by layera

/// make a theme preset
#[macro_export]
macro_rules! impl_preset {
    ($name:ident, $display_name:expr, $tokens:expr) => {
        /// a theme preset
        #[derive(Clone, Default)]
        pub struct $name;

        impl $crate::theme::presets::Preset for $name {
            fn tokens() -> $crate::theme::tokens::TokenSet {
                $tokens
            }

            fn name() -> &'static str {
                $display_name
            }
        }
    };
}

/// build a token map from `key => value` pairs
#[macro_export]
macro_rules! tokens {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::theme::tokens::TokenMap::new();
        $(
            map.insert($key.to_string(), $value.to_string());
        )*
        map
    }};
}

/// helper macro for generating validators
#[macro_export]
macro_rules! validator {
    ($struct_name:ty, $( $field:ident => $requirement:expr, $err_msg:expr );* $(;)? ) => {
        impl Validate for $struct_name {
            fn validate(&self) -> Result<(), Vec<String>> {
                let mut errors: Vec<String> = Vec::new();

                $(
                    if let Some(ref value) = self.$field {
                        if !($requirement)(value) {
                            errors.push(format!("{}: {}", stringify!($field), $err_msg));
                        }
                    }
                )*

                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(errors)
                }
            }
        }
    };
}

/// helper macro for nested validation
#[macro_export]
macro_rules! validator_nested {
    ($struct_name:ty,
        fields: { $( $field:ident => $requirement:expr, $err_msg:expr );* $(;)? }
        nested: { $( $nested:ident );* $(;)? }
    ) => {
        impl Validate for $struct_name {
            fn validate(&self) -> Result<(), Vec<String>> {
                let mut errors: Vec<String> = Vec::new();

                $(
                    if let Some(ref value) = self.$field {
                        if !($requirement)(value) {
                            errors.push(format!("{}: {}", stringify!($field), $err_msg));
                        }
                    }
                )*

                $(
                    if let Some(ref nested) = self.$nested {
                        if let Err(nested_errors) = nested.validate() {
                            for err in nested_errors {
                                errors.push(format!("{}.{}", stringify!($nested), err));
                            }
                        }
                    }
                )*

                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(errors)
                }
            }
        }
    };
}

/// get the current value of a given setting
#[macro_export]
macro_rules! getopt {
    () => {
        $crate::config::instance::config()
    };

    ($field:ident) => {{
        $crate::config::instance::get_or_default(
            |c| c.$field.clone(),
            $crate::config::options::Layera::default()
                .$field
                .expect(concat!("Default value missing for: ", stringify!($field))),
        )
    }};

    ($lvl1:ident . $field:ident) => {{
        $crate::config::instance::get_or_default(
            |c| c.$lvl1.as_ref().and_then(|sub| sub.$field.clone()),
            $crate::config::options::Layera::default()
                .$lvl1
                .and_then(|sub| sub.$field)
                .expect(concat!(
                    "Default value missing for: ",
                    stringify!($lvl1),
                    ".",
                    stringify!($field)
                )),
        )
    }};

    (raw $lvl1:ident . $field:ident) => {{
        $crate::config::instance::config()
            .ok()
            .and_then(|c| c.$lvl1.as_ref().and_then(|sub| sub.$field.clone()))
    }};
}

#[cfg(test)]
mod tests {
    use crate::config::validate::Validate;

    struct Limits {
        slots: Option<usize>,
        name: Option<String>,
    }

    crate::validator! { Limits,
        slots => |v: &usize| *v >= 1 && *v <= 4,
            "must be between 1 and 4";
        name => |v: &String| !v.trim().is_empty(),
            "must not be empty";
    }

    #[test]
    fn test_validator_collects_every_failure() {
        let limits = Limits {
            slots: Some(9),
            name: Some("  ".to_string()),
        };

        let errors = limits.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                "slots: must be between 1 and 4".to_string(),
                "name: must not be empty".to_string(),
            ]
        );
    }

    #[test]
    fn test_validator_skips_unset_fields() {
        let limits = Limits {
            slots: None,
            name: None,
        };

        assert!(limits.is_valid());
    }

    #[test]
    fn test_tokens_macro_keeps_insertion_keys() {
        let map = crate::tokens! {
            "spacing-sm" => "8px",
            "spacing-md" => "16px",
        };

        assert_eq!(map.get("spacing-md").map(String::as_str), Some("16px"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_getopt_falls_back_to_defaults() {
        let key: String = crate::getopt!(theme.storage_key);
        assert!(!key.is_empty());
    }
}
