use crate::failure::{BoxError, Failure};

/// What a refreshed future may resolve to.
///
/// A plain `T` always succeeds. A `Result<T, X>` fails with its error, boxed into a [`Failure`].
pub trait IntoOutcome<T> {
    fn into_outcome(self) -> Result<T, Failure>;
}

impl<T> IntoOutcome<T> for T {
    fn into_outcome(self) -> Result<T, Failure> {
        Ok(self)
    }
}

impl<T, X> IntoOutcome<T> for Result<T, X>
where
    X: Into<BoxError>,
{
    fn into_outcome(self) -> Result<T, Failure> {
        self.map_err(Failure::new)
    }
}
