//! Pre-built mock hosts for testing.

use super::MockPdh;
use crate::collector::adfs::AdfsCounters;
use crate::collector::logical_disk::LogicalDiskCounters;
use crate::pdh::CounterRecord;

impl MockPdh {
    /// A workstation with three volumes and no AD FS role.
    ///
    /// Volumes: `C:` (50 GiB free), `D:` (200 GiB free), `HarddiskVolume1`
    /// (the recovery partition) and the `_Total` aggregate.
    pub fn typical_host() -> Self {
        let pdh = Self::new();

        let volumes = [
            ("C:", 51_200.0, 2.0),
            ("D:", 204_800.0, 0.0),
            ("HarddiskVolume1", 80.0, 0.0),
            ("_Total", 256_080.0, 2.0),
        ];
        for (volume, free_megabytes, queued) in volumes {
            for (index, field) in LogicalDiskCounters::FIELDS.iter().enumerate() {
                let value = match field.counter {
                    "Free Megabytes" => free_megabytes,
                    "Current Disk Queue Length" => queued,
                    _ => 1_000.0 * (index as f64 + 1.0),
                };
                pdh.set_instance_value("LogicalDisk", volume, field.counter, value);
            }
        }

        pdh
    }

    /// [`typical_host`](Self::typical_host) with the AD FS role installed.
    ///
    /// Every AD FS counter starts at a distinct small value.
    pub fn adfs_host() -> Self {
        let pdh = Self::typical_host();
        for (index, field) in AdfsCounters::FIELDS.iter().enumerate() {
            pdh.set_value("AD FS", field.counter, index as f64);
        }
        pdh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdh::PdhApi;

    #[test]
    fn test_typical_host_has_no_adfs() {
        let pdh = MockPdh::typical_host();
        let query = pdh.open_query().unwrap();
        assert!(pdh.add_counter(query, "\\LogicalDisk(*)\\Free Megabytes").is_ok());
        assert_eq!(
            pdh.add_counter(query, "\\AD FS\\Passive Requests"),
            Err(crate::pdh::PdhStatus::CSTATUS_NO_OBJECT)
        );
    }

    #[test]
    fn test_adfs_host_declares_every_counter() {
        let pdh = MockPdh::adfs_host();
        let query = pdh.open_query().unwrap();
        for field in AdfsCounters::FIELDS {
            let path = format!("\\AD FS\\{}", field.counter);
            assert!(pdh.add_counter(query, &path).is_ok(), "{}", path);
        }
    }
}
