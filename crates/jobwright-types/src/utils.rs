//! Utility macros

/// Lock a `std::sync::Mutex`, turning poisoning into `Error::Internal`.
///
/// ```ignore
/// let jobs = lock!(self.jobs, "jobs")?;
/// ```
#[macro_export]
macro_rules! lock {
	($mutex:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal("mutex poisoned".into()))
	};
	($mutex:expr, $name:literal) => {
		$mutex.lock().map_err(|_| {
			::tracing::error!("Mutex poisoned: {}", $name);
			$crate::error::Error::Internal(format!("mutex poisoned: {}", $name))
		})
	};
}

// vim: ts=4
