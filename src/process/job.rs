//! Windows job objects.
//!
//! A launched `cmd.exe` is assigned to a job created with
//! `JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE`. Every process it starts joins the
//! same job, so the job still sees descendants after `cmd.exe` itself has
//! exited, and closing the last handle takes all of them down.

use std::ffi::c_void;
use std::io;
use std::mem;
use std::os::windows::io::RawHandle;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JobObjectBasicAccountingInformation,
    JobObjectExtendedLimitInformation, QueryInformationJobObject, SetInformationJobObject,
    TerminateJobObject, JOBOBJECT_BASIC_ACCOUNTING_INFORMATION,
    JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
};

/// Exit code given to processes ended through [`JobObject::terminate`].
const JOB_KILL_EXIT_CODE: u32 = 1;

/// Owned job object handle. Closing it kills every process in the job.
#[derive(Debug)]
pub(crate) struct JobObject {
    handle: HANDLE,
}

// SAFETY: a job HANDLE is an opaque kernel object reference usable from any
// thread; all calls on it are thread-safe kernel calls.
unsafe impl Send for JobObject {}
unsafe impl Sync for JobObject {}

impl JobObject {
    /// Create an anonymous job that kills its processes when closed.
    pub(crate) fn create() -> io::Result<Self> {
        // SAFETY: both calls only read the stack-local `info` and the
        // handle returned by `CreateJobObjectW`, which `job` owns from here
        // on and closes on drop if configuration fails.
        unsafe {
            let handle = CreateJobObjectW(None, PCWSTR::null()).map_err(io::Error::from)?;
            let job = Self { handle };

            let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = mem::zeroed();
            info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
            SetInformationJobObject(
                job.handle,
                JobObjectExtendedLimitInformation,
                &info as *const JOBOBJECT_EXTENDED_LIMIT_INFORMATION as *const c_void,
                mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
            .map_err(io::Error::from)?;

            Ok(job)
        }
    }

    /// Put the process behind `process` into this job.
    pub(crate) fn assign(&self, process: RawHandle) -> io::Result<()> {
        // SAFETY: `process` is the live handle of a child we spawned and
        // still own; the job handle is valid for the lifetime of `self`.
        unsafe { AssignProcessToJobObject(self.handle, HANDLE(process)).map_err(io::Error::from) }
    }

    /// Number of processes in the job that have not exited.
    pub(crate) fn active_processes(&self) -> io::Result<u32> {
        // SAFETY: the output buffer is a stack-local struct of exactly the
        // size passed in.
        unsafe {
            let mut info: JOBOBJECT_BASIC_ACCOUNTING_INFORMATION = mem::zeroed();
            QueryInformationJobObject(
                Some(self.handle),
                JobObjectBasicAccountingInformation,
                &mut info as *mut JOBOBJECT_BASIC_ACCOUNTING_INFORMATION as *mut c_void,
                mem::size_of::<JOBOBJECT_BASIC_ACCOUNTING_INFORMATION>() as u32,
                None,
            )
            .map_err(io::Error::from)?;
            Ok(info.ActiveProcesses)
        }
    }

    /// Kill every process in the job.
    pub(crate) fn terminate(&self) -> io::Result<()> {
        // SAFETY: the job handle is valid for the lifetime of `self`.
        unsafe { TerminateJobObject(self.handle, JOB_KILL_EXIT_CODE).map_err(io::Error::from) }
    }
}

impl Drop for JobObject {
    fn drop(&mut self) {
        // SAFETY: `handle` came from `CreateJobObjectW` and is closed once.
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}
