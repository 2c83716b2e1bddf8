use std::{error::Error, fmt, sync::Arc};

/// The error returned by the client and passed along the exchange chain.
///
/// Any error type converts into it, and the original error can be recovered with
/// [`downcast_ref`](#method.downcast_ref).
#[derive(Clone, Debug)]
pub struct QueryError {
    inner: Arc<Box<dyn Error + Send + Sync>>
}

#[derive(Debug)]
pub struct QueryErrorCompat(QueryError);

impl Error for QueryErrorCompat {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl fmt::Display for QueryErrorCompat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl QueryError {
    pub fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }

    /// The wrapped error, if it is of type `T`.
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        let inner: &(dyn Error + Send + Sync + 'static) = &**self.inner;
        inner.downcast_ref::<T>()
    }

    pub fn is<T: Error + 'static>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Turn this into a type that implements `std::error::Error`, for use with `?` in
    /// functions returning boxed errors.
    pub fn compat(self) -> QueryErrorCompat {
        QueryErrorCompat(self)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<T: Error + Send + Sync + 'static> From<T> for QueryError {
    fn from(e: T) -> Self {
        QueryError {
            inner: Arc::new(Box::new(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QueryError;
    use std::{error::Error, fmt};

    #[derive(Debug, PartialEq)]
    struct Broken(u32);

    impl Error for Broken {}
    impl fmt::Display for Broken {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "broken {}", self.0)
        }
    }

    #[test]
    fn keeps_the_original_error() {
        let err: QueryError = Broken(3).into();

        assert_eq!(err.to_string(), "broken 3");
        assert_eq!(err.downcast_ref::<Broken>(), Some(&Broken(3)));
        assert!(!err.is::<std::io::Error>());
    }
}
