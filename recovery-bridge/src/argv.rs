//! Argument vectors handed across the C boundary
//!
//! [`OwnedArgv`] builds a `char **` array of NUL-terminated strings and owns
//! it until it is dropped or handed out with [`OwnedArgv::into_raw`]. The raw
//! release functions free an array built that way: every element in ascending
//! order, then the array itself.

use crate::types::{BridgeError, Result};
use std::ffi::{CStr, CString};
use std::fmt;
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_int};
use std::ptr;

/// A process-style argument vector with C layout
pub struct OwnedArgv {
    argv: *mut *mut c_char,
    len: usize,
}

impl OwnedArgv {
    /// Build an argument vector from anything convertible to C strings
    ///
    /// Fails without allocating the C array if an argument contains a NUL
    /// byte or there are more arguments than a C `int` can count.
    pub fn new<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let strings = args
            .into_iter()
            .enumerate()
            .map(|(index, arg)| CString::new(arg).map_err(|_| BridgeError::InteriorNul { index }))
            .collect::<Result<Vec<_>>>()?;

        if c_int::try_from(strings.len()).is_err() {
            return Err(BridgeError::TooManyArguments(strings.len()));
        }

        let mut slots = Vec::with_capacity(strings.len());
        for arg in strings {
            slots.push(arg.into_raw());
        }
        let len = slots.len();
        let argv = Box::into_raw(slots.into_boxed_slice()).cast::<*mut c_char>();

        Ok(Self { argv, len })
    }

    /// Argument vector with `program` in slot 0, followed by `args`
    pub fn with_program<P, I, S>(program: P, args: I) -> Result<Self>
    where
        P: Into<Vec<u8>>,
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self::new(std::iter::once(program.into()).chain(args.into_iter().map(Into::<Vec<u8>>::into)))
    }

    /// Take back ownership of a vector previously released with [`Self::into_raw`]
    ///
    /// # Safety
    /// `argv` must be null with `argc == 0`, or exactly the pair returned by
    /// `into_raw` and not released since.
    pub unsafe fn from_raw(argc: c_int, argv: *mut *mut c_char) -> Result<Self> {
        let len = checked_count(argc, argv)?;
        if argv.is_null() {
            return Ok(Self {
                argv: ptr::null_mut(),
                len: 0,
            });
        }
        Ok(Self { argv, len })
    }

    /// Hand the vector over as an `(argc, argv)` pair
    ///
    /// The receiver becomes responsible for passing it to [`release_argv`],
    /// [`freeargv`] or [`Self::from_raw`] exactly once.
    pub fn into_raw(self) -> (c_int, *mut *mut c_char) {
        let this = ManuallyDrop::new(self);
        (this.argc(), this.argv)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element count as a C `int`
    pub fn argc(&self) -> c_int {
        // Bounded at construction
        self.len as c_int
    }

    /// Pointer to lend to C code for the lifetime of `self`
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.argv
    }

    pub fn get(&self, index: usize) -> Option<&CStr> {
        if index >= self.len {
            return None;
        }
        // SAFETY: index is in bounds and every slot holds a string built in `new`.
        unsafe { Some(CStr::from_ptr(*self.argv.add(index))) }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Lossy UTF-8 copies of every argument
    pub fn to_strings(&self) -> Vec<String> {
        self.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

impl Drop for OwnedArgv {
    fn drop(&mut self) {
        // SAFETY: the pair was built by `new` or accepted by `from_raw`, and
        // `into_raw` skips this drop.
        unsafe { release_argv(self.len, self.argv) }
    }
}

impl fmt::Debug for OwnedArgv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// The vector is exclusively owned; moving it to another thread moves the
// whole allocation with it.
unsafe impl Send for OwnedArgv {}

/// Release every element of `argv`, in ascending order, and then the array
///
/// A null `argv` is a no-op. Null elements are skipped.
///
/// # Safety
/// `argv` must be null or an array of exactly `count` elements built by
/// [`OwnedArgv`] and handed out with `into_raw`, with every string still
/// holding its original bytes. Nothing may use the array or its strings
/// afterwards, and releasing the same array twice is undefined.
pub unsafe fn release_argv(count: usize, argv: *mut *mut c_char) {
    if argv.is_null() {
        return;
    }

    let slots = Box::from_raw(ptr::slice_from_raw_parts_mut(argv, count));
    for &arg in slots.iter() {
        if !arg.is_null() {
            drop(CString::from_raw(arg));
        }
    }
    drop(slots);
}

/// Checked form of [`release_argv`] for a C-style `(argc, argv)` pair
///
/// A negative count, or a null array with a nonzero count, is rejected and
/// nothing is released.
///
/// # Safety
/// Same as [`release_argv`] once the pair passes the checks.
pub unsafe fn try_release_argv(argc: c_int, argv: *mut *mut c_char) -> Result<()> {
    let count = checked_count(argc, argv)?;
    release_argv(count, argv);
    Ok(())
}

/// C-ABI release entry point for vectors built by this crate
///
/// Frees with the Rust allocator, so the only valid input is a pair produced
/// by [`OwnedArgv::into_raw`]. Storage from `malloc`, or strings the callee
/// has shortened or rewritten in place, must not be passed here.
///
/// # Safety
/// Same as [`release_argv`].
#[no_mangle]
pub unsafe extern "C" fn freeargv(argc: c_int, argv: *mut *mut c_char) {
    if let Err(e) = try_release_argv(argc, argv) {
        log::error!("freeargv: {}", e);
    }
}

fn checked_count(argc: c_int, argv: *mut *mut c_char) -> Result<usize> {
    let count = usize::try_from(argc)
        .map_err(|_| BridgeError::InvalidArgument(format!("negative argument count {}", argc)))?;

    if argv.is_null() && count != 0 {
        return Err(BridgeError::InvalidArgument(format!(
            "null argument vector with count {}",
            count
        )));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_argv() {
        let argv = OwnedArgv::new(["--flag", "value", "extra"]).unwrap();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv.argc(), 3);
        assert_eq!(argv.to_strings(), vec!["--flag", "value", "extra"]);
        assert_eq!(argv.get(1).unwrap().to_bytes(), b"value");
        assert!(argv.get(3).is_none());
    }

    #[test]
    fn test_with_program_prepends() {
        let argv = OwnedArgv::with_program("/opt/engine", vec!["-m".to_string(), "0".to_string()]).unwrap();
        assert_eq!(argv.to_strings(), vec!["/opt/engine", "-m", "0"]);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = OwnedArgv::new(["ok", "bad\0arg"]).unwrap_err();
        assert!(matches!(err, BridgeError::InteriorNul { index: 1 }));
    }

    #[test]
    fn test_empty_argv() {
        let argv = OwnedArgv::new(Vec::<String>::new()).unwrap();
        assert!(argv.is_empty());
        assert_eq!(argv.argc(), 0);
    }

    #[test]
    fn test_release_null_is_noop() {
        unsafe {
            release_argv(0, ptr::null_mut());
            freeargv(0, ptr::null_mut());
        }
        assert!(unsafe { try_release_argv(0, ptr::null_mut()) }.is_ok());
    }

    #[test]
    fn test_checked_release_rejects_bad_pairs() {
        let negative = unsafe { try_release_argv(-1, ptr::null_mut()) };
        assert!(matches!(negative, Err(BridgeError::InvalidArgument(_))));

        let null_with_count = unsafe { try_release_argv(2, ptr::null_mut()) };
        assert!(matches!(null_with_count, Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn test_raw_round_trip() {
        let (argc, argv) = OwnedArgv::new(["a", "b"]).unwrap().into_raw();
        assert_eq!(argc, 2);

        let back = unsafe { OwnedArgv::from_raw(argc, argv) }.unwrap();
        assert_eq!(back.to_strings(), vec!["a", "b"]);
    }

    #[test]
    fn test_release_through_c_entry() {
        let (argc, argv) = OwnedArgv::new(["x", "y", "z"]).unwrap().into_raw();
        unsafe { freeargv(argc, argv) };
    }
}
