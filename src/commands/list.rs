//! List command implementation

use mtdflash_core::PartitionTable;

/// Print discovered partitions, one per line
pub fn list_partitions(table: &PartitionTable, verbose: bool) {
    for record in table {
        if verbose {
            println!(
                "    {}     Size: {}     Erase size: {}",
                record,
                format_size(record.size),
                format_size(record.erase_size)
            );
        } else {
            println!("    {}", record);
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
