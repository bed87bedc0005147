/// Shell sort over a slot-number array, ordering by the key bytes stored in
/// the mirror.
///
/// Gap schedule per Knuth's recurrence `h(k+1) = 3·h(k) + 1` (1, 4, 13, 40,
/// ...): grow until the gap reaches the element count, then step back twice;
/// element counts of 13 or less start at gap 1 (straight insertion).
pub(crate) fn shell_sort(
    records: &mut [u32],
    mirror: &[u8],
    slot_entry: usize,
    key_offset: u16,
    key_size: u16,
) {
    let n = records.len();
    if n < 2 {
        return;
    }

    let key = |slot: u32| -> &[u8] {
        let base = slot as usize * slot_entry + usize::from(key_offset);
        &mirror[base..base + usize::from(key_size)]
    };

    let mut gap: usize = 1;
    if n > 13 {
        while gap < n {
            gap = gap * 3 + 1;
        }
        gap /= 3;
        gap /= 3;
    }

    while gap > 0 {
        for i in gap..n {
            let current = records[i];
            let mut j = i;
            while j >= gap && key(records[j - gap]) > key(current) {
                records[j] = records[j - gap];
                j -= gap;
            }
            records[j] = current;
        }
        gap /= 3;
    }
}
