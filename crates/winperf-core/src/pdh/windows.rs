//! Native PDH bindings (Windows only).

use std::ptr;

use windows_sys::Win32::System::Performance::{
    PDH_FMT_COUNTERVALUE_ITEM_W, PDH_HCOUNTER, PDH_HQUERY, PDH_RAW_COUNTER_ITEM_W,
    PdhAddEnglishCounterW, PdhCloseQuery, PdhCollectQueryData, PdhGetFormattedCounterArrayW,
    PdhGetRawCounterArrayW, PdhOpenQueryW, PdhRemoveCounter,
};

use super::api::{
    ArrayError, ArrayItem, CounterHandle, CounterValue, PdhApi, PdhStatus, QueryHandle,
    ValueFormat,
};

const PDH_FMT_DOUBLE: u32 = 0x0000_0200;
const PDH_FMT_LARGE: u32 = 0x0000_0400;
const PDH_FMT_NOCAP100: u32 = 0x0000_8000;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Reads a NUL-terminated UTF-16 string. Empty strings become `None`.
///
/// # Safety
/// `p` must be null or point to a NUL-terminated UTF-16 string.
unsafe fn from_wide(p: *const u16) -> Option<String> {
    if p.is_null() {
        return None;
    }
    let mut len = 0;
    // SAFETY: the caller guarantees a terminating NUL.
    unsafe {
        while *p.add(len) != 0 {
            len += 1;
        }
        let s = String::from_utf16_lossy(std::slice::from_raw_parts(p, len));
        if s.is_empty() { None } else { Some(s) }
    }
}

fn check(status: u32) -> Result<(), PdhStatus> {
    let status = PdhStatus(status);
    if status.is_success() {
        Ok(())
    } else {
        Err(status)
    }
}

/// PDH backed by `pdh.dll`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinPdh;

impl WinPdh {
    pub fn new() -> Self {
        Self
    }
}

impl PdhApi for WinPdh {
    fn open_query(&self) -> Result<QueryHandle, PdhStatus> {
        let mut query: PDH_HQUERY = 0usize as _;
        // SAFETY: `query` is a valid out pointer.
        check(unsafe { PdhOpenQueryW(ptr::null(), 0, &mut query) })?;
        Ok(QueryHandle(query as usize))
    }

    fn add_counter(&self, query: QueryHandle, path: &str) -> Result<CounterHandle, PdhStatus> {
        let path = wide(path);
        let mut counter: PDH_HCOUNTER = 0usize as _;
        // SAFETY: `path` is NUL-terminated and outlives the call.
        check(unsafe { PdhAddEnglishCounterW(query.0 as _, path.as_ptr(), 0, &mut counter) })?;
        Ok(CounterHandle(counter as usize))
    }

    fn remove_counter(&self, counter: CounterHandle) -> Result<(), PdhStatus> {
        // SAFETY: the handle came from `add_counter`.
        check(unsafe { PdhRemoveCounter(counter.0 as _) })
    }

    fn collect_query_data(&self, query: QueryHandle) -> Result<(), PdhStatus> {
        // SAFETY: the handle came from `open_query`.
        check(unsafe { PdhCollectQueryData(query.0 as _) })
    }

    fn counter_array(
        &self,
        counter: CounterHandle,
        format: ValueFormat,
        buffer: &mut [u64],
    ) -> Result<Vec<ArrayItem>, ArrayError> {
        let mut size = u32::try_from(buffer.len() * std::mem::size_of::<u64>())
            .map_err(|_| ArrayError::Status(PdhStatus::INSUFFICIENT_BUFFER))?;
        let mut count = 0u32;
        let data = if buffer.is_empty() {
            ptr::null_mut()
        } else {
            buffer.as_mut_ptr()
        };

        let status = match format {
            // SAFETY: `data` holds `size` writable bytes, aligned to 8.
            ValueFormat::Raw => unsafe {
                PdhGetRawCounterArrayW(counter.0 as _, &mut size, &mut count, data.cast())
            },
            ValueFormat::Double | ValueFormat::Large => {
                let flags = match format {
                    ValueFormat::Large => PDH_FMT_LARGE,
                    _ => PDH_FMT_DOUBLE,
                } | PDH_FMT_NOCAP100;
                // SAFETY: as above.
                unsafe {
                    PdhGetFormattedCounterArrayW(
                        counter.0 as _,
                        flags as _,
                        &mut size,
                        &mut count,
                        data.cast(),
                    )
                }
            }
        };

        match PdhStatus(status) {
            PdhStatus::MORE_DATA => {
                return Err(ArrayError::MoreData {
                    required: size as usize,
                });
            }
            other if !other.is_success() => return Err(ArrayError::Status(other)),
            _ => {}
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut items = Vec::with_capacity(count as usize);
        match format {
            ValueFormat::Raw => {
                // SAFETY: on success PDH wrote `count` items at the start of
                // the buffer; name pointers point into the same buffer.
                let raw = unsafe {
                    std::slice::from_raw_parts(data.cast::<PDH_RAW_COUNTER_ITEM_W>(), count as usize)
                };
                for item in raw {
                    if !PdhStatus(item.RawValue.CStatus).is_success() {
                        continue;
                    }
                    items.push(ArrayItem {
                        // SAFETY: see above.
                        instance: unsafe { from_wide(item.szName) },
                        value: CounterValue::Raw(item.RawValue.FirstValue as u64),
                    });
                }
            }
            ValueFormat::Double | ValueFormat::Large => {
                // SAFETY: as for the raw array.
                let fmt = unsafe {
                    std::slice::from_raw_parts(
                        data.cast::<PDH_FMT_COUNTERVALUE_ITEM_W>(),
                        count as usize,
                    )
                };
                for item in fmt {
                    if !PdhStatus(item.FmtValue.CStatus).is_success() {
                        continue;
                    }
                    // SAFETY: the union member matches the requested format.
                    let value = unsafe {
                        match format {
                            ValueFormat::Large => CounterValue::Large(item.FmtValue.Anonymous.largeValue),
                            _ => CounterValue::Double(item.FmtValue.Anonymous.doubleValue),
                        }
                    };
                    items.push(ArrayItem {
                        // SAFETY: see above.
                        instance: unsafe { from_wide(item.szName) },
                        value,
                    });
                }
            }
        }
        Ok(items)
    }

    fn close_query(&self, query: QueryHandle) -> Result<(), PdhStatus> {
        // SAFETY: the handle came from `open_query` and is closed once.
        check(unsafe { PdhCloseQuery(query.0 as _) })
    }
}
