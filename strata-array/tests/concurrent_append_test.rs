use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use strata_array::{ConcurrentArray, ContainerConfig, StrataError, StrategyKind};

fn thread_safe_kinds() -> impl Iterator<Item = StrategyKind> {
    StrategyKind::ALL.into_iter().filter(|k| k.is_thread_safe())
}

fn append_from_threads(array: &Arc<ConcurrentArray<u32>>, threads: u32, per_thread: u32) -> Vec<usize> {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let array = array.clone();
            thread::spawn(move || {
                (0..per_thread)
                    .map(|i| array.append(t * per_thread + i).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect()
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_synchronized_four_threads_thousand_appends() {
    let array = Arc::new(ConcurrentArray::<u32>::new(StrategyKind::Synchronized));
    append_from_threads(&array, 4, 1000);

    assert_eq!(array.size(), 4000);
    let values: HashSet<u32> = array.to_vec().into_iter().collect();
    assert_eq!(values.len(), 4000, "duplicate values");
    assert_eq!(values, (0..4000).collect::<HashSet<_>>());
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_every_strategy_keeps_every_append() {
    for kind in thread_safe_kinds() {
        let config = ContainerConfig::new(kind).with_initial_capacity(0);
        let array = Arc::new(ConcurrentArray::<u32>::with_config(config).unwrap());
        let mut indices = append_from_threads(&array, 4, 1000);

        assert_eq!(array.size(), 4000, "{kind}");
        indices.sort_unstable();
        assert_eq!(indices, (0..4000).collect::<Vec<_>>(), "{kind}: indices");

        let mut values = array.to_vec();
        values.sort_unstable();
        assert_eq!(values, (0..4000).collect::<Vec<_>>(), "{kind}: values");
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_returned_index_holds_the_appended_value() {
    for kind in thread_safe_kinds() {
        let array = Arc::new(ConcurrentArray::<u64>::new(kind));
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let array = array.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        let value = (t << 32) | i;
                        let index = array.append(value).unwrap();
                        assert_eq!(array.read(index), Ok(value), "{kind}");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(array.len(), 2000);
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_overflow_under_contention_is_exact() {
    for kind in thread_safe_kinds() {
        let config = ContainerConfig::new(kind)
            .with_initial_capacity(1)
            .with_max_capacity(1000);
        let array = Arc::new(ConcurrentArray::<u32>::with_config(config).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let array = array.clone();
                thread::spawn(move || {
                    let mut ok = 0;
                    let mut overflow = 0;
                    for i in 0..300 {
                        match array.append(i) {
                            Ok(_) => ok += 1,
                            Err(StrataError::CapacityOverflow { max, .. }) => {
                                assert_eq!(max, 1000);
                                overflow += 1;
                            }
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    (ok, overflow)
                })
            })
            .collect();

        let (ok, overflow) = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .fold((0, 0), |(a, b), (c, d)| (a + c, b + d));
        assert_eq!(ok, 1000, "{kind}");
        assert_eq!(overflow, 200, "{kind}");
        assert_eq!(array.size(), 1000, "{kind}");
        assert_eq!(array.capacity(), 1000, "{kind}");
    }
}
