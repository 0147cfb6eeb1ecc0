use crate::util::constants::{BYTES_IN_PAGE, DEFAULT_GENERATIONS, DEFAULT_HEAP_SIZE};

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($name: $type[$validator] = $default),*);
    ];
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        /// Options of the large object space and of the reference page resource.
        #[derive(Clone, Debug)]
        pub struct Options {
            $(pub $name: $type),*
        }
        impl Options {
            /// Set an option from its name and a string value. Returns false if the
            /// name is unknown, or the value cannot be parsed or is invalid. The
            /// option keeps its previous value in that case.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling set_from_str()) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            warn!("Unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        warn!("Unable to set {}={:?}. Cant parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => {
                        warn!("Unknown option {}", s);
                        false
                    }
                }
            }

            /// Options with their default values, ignoring the environment.
            pub fn without_env() -> Self {
                Options {
                    $($name: $default),*
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Self::without_env();

                // If we have env vars that start with GENLOS_ and match any option (such as GENLOS_GENERATIONS),
                // we set the option to its value (if it is a valid value). Otherwise, use the default value.
                const PREFIX: &str = "GENLOS_";
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { options.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
                options
            }
        }
    ]
}

options! {
    // Number of generations in the large object space. Generation 0 is the youngest.
    generations:          usize [|v: &usize| *v > 0]             = DEFAULT_GENERATIONS,
    // Page budget of the reference page resource, in bytes.
    heap_size:            usize [|v: &usize| *v >= BYTES_IN_PAGE] = DEFAULT_HEAP_SIZE,
    // Verify every list when a collection cycle finishes.
    verify_on_collection: bool  [always_valid]                    = false,
}
