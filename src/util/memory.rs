use crate::util::Address;
use std::io::{Error, Result};

/// Demand-zero mmap anywhere in the address space:
/// This function guarantees to zero all mapped memory, and the returned address is page aligned.
pub fn dzmmap_anywhere(size: usize) -> Result<Address> {
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_ANON | libc::MAP_PRIVATE;
    let ret = unsafe { libc::mmap(std::ptr::null_mut(), size, prot, flags, -1, 0) };
    if ret == libc::MAP_FAILED {
        Err(Error::last_os_error())
    } else {
        Ok(Address::from_mut_ptr(ret))
    }
}

pub fn munmap(start: Address, size: usize) -> Result<()> {
    wrap_libc_call(&|| unsafe { libc::munmap(start.to_mut_ptr(), size) }, 0)
}

/// Check whether the given OS error number indicates an out-of-memory condition.
pub fn is_mmap_oom(os_errno: i32) -> bool {
    os_errno == libc::ENOMEM
}

fn wrap_libc_call<T: PartialEq>(f: &dyn Fn() -> T, expect: T) -> Result<()> {
    let ret = f();
    if ret == expect {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
