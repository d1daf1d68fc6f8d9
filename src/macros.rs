// Global macros for internal resona usage.

//---------------------------------------------------------------------------------------------------- Channels
// SAFETY:
// These macros are used in situations where
// a [send/recv] erroring is a logical error.

// Receive a channel message, unwrap.
macro_rules! recv {
    ($channel:expr) => {
		if cfg!(debug_assertions) {
        	$channel.recv().unwrap()
		} else {
	        unsafe { $channel.recv().unwrap_unchecked() }
		}
    }
}
pub(crate) use recv;

// Send a channel message, unwrap.
macro_rules! send {
    ($channel:expr, $($msg:tt)+) => {
		if cfg!(debug_assertions) {
        	$channel.send($($msg)+).unwrap()
		} else {
	        unsafe { $channel.send($($msg)+).unwrap_unchecked() }
		}
    }
}
pub(crate) use send;

// `try_send` a channel message, unwrap.
macro_rules! try_send {
    ($channel:expr, $($msg:tt)+) => {
		if cfg!(debug_assertions) {
        	$channel.try_send($($msg)+).unwrap()
		} else {
	        unsafe { $channel.try_send($($msg)+).unwrap_unchecked() }
		}
    }
}
pub(crate) use try_send;

//---------------------------------------------------------------------------------------------------- Thread context
// The control/IO thread split is enforced with these.
//
// Every device IO thread is named with an `io-` prefix (see
// [crate::device]), so in debug mode we can cheaply verify
// which side of the fence the caller is standing on.

// Assert we are _not_ running on a device IO thread.
macro_rules! assert_ctl_context {
	() => {
		#[cfg(debug_assertions)]
		{
			let name = std::thread::current().name().unwrap_or("").to_owned();
			assert!(
				!name.starts_with("io-"),
				"control-thread operation called from IO thread `{name}`",
			);
		}
	}
}
pub(crate) use assert_ctl_context;

// Assert we _are_ running on a device IO thread.
macro_rules! assert_io_context {
	() => {
		#[cfg(debug_assertions)]
		{
			let name = std::thread::current().name().unwrap_or("").to_owned();
			assert!(
				name.starts_with("io-"),
				"IO-thread operation called from `{name}`",
			);
		}
	}
}
pub(crate) use assert_io_context;

//---------------------------------------------------------------------------------------------------- Logging
// Logs with `log` but only if in debug
// mode or if the log feature is enabled.

macro_rules! error2 {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::error!($($arg)+);
    }};
}
pub(crate) use error2;

macro_rules! warn2 {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::warn!($($arg)+);
    }};
}
pub(crate) use warn2;

macro_rules! info2 {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::info!($($arg)+);
    }};
}
pub(crate) use info2;

macro_rules! debug2 {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::debug!($($arg)+);
    }};
}
pub(crate) use debug2;

macro_rules! trace2 {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        ::log::trace!($($arg)+);
    }};
}
pub(crate) use trace2;
