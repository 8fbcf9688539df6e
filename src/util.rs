//! Various utilities.

use failure::Fallible;
use log::error;

/// Logs an error, including its causes and backtrace (if possible).
pub fn log_err(err: &failure::Error) {
    let mut first = true;
    let num_errs = err.iter_chain().count();
    if num_errs <= 1 {
        error!("{}", err);
    } else {
        for cause in err.iter_chain() {
            if first {
                first = false;
                error!("           {}", cause);
            } else {
                error!("caused by: {}", cause);
            }
        }
    }
    let bt = err.backtrace().to_string();
    if bt != "" {
        error!("{}", bt);
    }
}

/// Runs a blocking function on the runtime's blocking thread pool.
pub async fn blocking<F, T>(func: F) -> Fallible<T>
where
    F: 'static + FnOnce() -> Fallible<T> + Send,
    T: 'static + Send,
{
    tokio::task::spawn_blocking(func).await?
}

/// The type of a responder. Since `impl Trait` can't be used in `type` items, this magics one up.
macro_rules! Resp {
    () => { warp::filters::BoxedFilter<(impl warp::Reply,)> };
}

/// Inserts `.or(...)` between the given filters. Each path is a prefix; the handler is responsible
/// for matching the rest of the path.
macro_rules! route_any {
    ($hm:ident $hp:tt => $h:expr $(, $tm:ident $tp:tt => $t:expr)* $(,)*) => {
        route_any!(@internal @path $hm $hp).and($h)
            $(.or(route_any!(@internal @path $tm $tp).and($t)))*
    };

    (@internal @path GET ()) => {{ warp::get() }};
    (@internal @path POST ()) => {{ warp::post() }};
    (@internal @path PUT ()) => {{ warp::put() }};
    (@internal @path PATCH ()) => {{ warp::patch() }};
    (@internal @path DELETE ()) => {{ warp::delete() }};
    (@internal @path $m:ident ($($p:tt)*)) => {{
        warp::path!($($p)* / ..).and(route_any!(@internal @path $m ()))
    }};
}

/// Defines a string-valued enum, which is stored as text in the database and serialized as the
/// same text to JSON.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $s:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Eq,
            Hash,
            PartialEq,
            serde_derive::Deserialize,
            serde_derive::Serialize,
        )]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $s)] $variant,)*
        }

        impl $name {
            /// Returns the textual form of the value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $s,)*
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
                fmt.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::schema::UnknownVariant;

            fn from_str(s: &str) -> Result<$name, $crate::schema::UnknownVariant> {
                match s {
                    $($s => Ok($name::$variant),)*
                    _ => Err($crate::schema::UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl std::convert::TryFrom<String> for $name {
            type Error = $crate::schema::UnknownVariant;

            fn try_from(s: String) -> Result<$name, $crate::schema::UnknownVariant> {
                s.parse()
            }
        }
    };
}
