use rand::Rng;
use std::sync::Arc;
use std::thread;
use strata_array::{ConcurrentArray, StrataError, StrategyKind};

/// Random mix of reads, writes and appends, the shape of the classic
/// array benchmark workload. Every value written carries its thread id in
/// the high bits and is checked for plausibility on read.
fn run_mixed(kind: StrategyKind, threads: u64, ops: usize) {
    let array = Arc::new(ConcurrentArray::<u64>::new(kind));
    for i in 0..100 {
        array.append(i).unwrap();
    }

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let array = array.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                let mut appended = 0usize;
                for _ in 0..ops {
                    let len = array.size();
                    let index = rng.random_range(0..len);
                    match rng.random_range(0..100) {
                        0..=79 => {
                            let value = array.read(index).unwrap();
                            assert!(value < 100 || (value >> 32) < threads, "{kind}: {value:#x}");
                        }
                        80..=94 => array.write(index, (t << 32) | 1).unwrap(),
                        _ => {
                            array.append((t << 32) | 2).unwrap();
                            appended += 1;
                        }
                    }
                }
                appended
            })
        })
        .collect();

    let appended: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(array.size(), 100 + appended, "{kind}");
    assert_eq!(
        array.read(array.size()),
        Err(StrataError::index_out_of_bounds(array.size(), array.size()))
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_mixed_workload_every_thread_safe_strategy() {
    for kind in StrategyKind::ALL.into_iter().filter(|k| k.is_thread_safe()) {
        run_mixed(kind, 4, 20_000);
    }
}

#[test]
fn test_mixed_workload_fixed_size_single_thread() {
    run_mixed(StrategyKind::FixedSize, 1, 20_000);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_migrate_between_workload_phases() {
    let mut array = ConcurrentArray::<u32>::new(StrategyKind::FixedSize);
    let mut expected = 0usize;

    for kind in StrategyKind::ALL.into_iter().cycle().take(14) {
        array.set_strategy(kind);
        let threads = if kind.is_thread_safe() { 4 } else { 1 };
        thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    for i in 0..250 {
                        array.append(i).unwrap();
                    }
                });
            }
        });
        expected += threads * 250;
        assert_eq!(array.size(), expected, "{kind}");
        assert_eq!(array.current_strategy_name(), kind.name());
    }
}
