use proptest::prelude::*;
use strata_array::{ConcurrentArray, ContainerConfig, StrataError, StrategyKind};

const MAX_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
enum Op {
    Append(i32),
    Read(usize),
    Write(usize, i32),
    EnsureCapacity(usize),
    Switch(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<i32>().prop_map(Op::Append),
        3 => (0usize..80).prop_map(Op::Read),
        2 => (0usize..80, any::<i32>()).prop_map(|(i, v)| Op::Write(i, v)),
        1 => (0usize..80).prop_map(Op::EnsureCapacity),
        1 => (0usize..StrategyKind::ALL.len()).prop_map(Op::Switch),
    ]
}

/// Reference behaviour: a plain `Vec` with the same limits.
#[derive(Default)]
struct Model {
    values: Vec<i32>,
}

impl Model {
    fn append(&mut self, value: i32) -> Result<usize, StrataError> {
        if self.values.len() == MAX_CAPACITY {
            return Err(StrataError::capacity_overflow(MAX_CAPACITY + 1, MAX_CAPACITY));
        }
        self.values.push(value);
        Ok(self.values.len() - 1)
    }

    fn read(&self, index: usize) -> Result<i32, StrataError> {
        self.values
            .get(index)
            .copied()
            .ok_or(StrataError::index_out_of_bounds(index, self.values.len()))
    }

    fn write(&mut self, index: usize, value: i32) -> Result<(), StrataError> {
        let len = self.values.len();
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StrataError::index_out_of_bounds(index, len)),
        }
    }

    fn ensure_capacity(&self, required: usize) -> Result<(), StrataError> {
        if required > MAX_CAPACITY {
            Err(StrataError::capacity_overflow(required, MAX_CAPACITY))
        } else {
            Ok(())
        }
    }
}

fn run(kind: StrategyKind, ops: &[Op]) -> Result<(), TestCaseError> {
    let config = ContainerConfig::new(kind)
        .with_initial_capacity(2)
        .with_max_capacity(MAX_CAPACITY);
    let mut array = ConcurrentArray::with_config(config).unwrap();
    let mut model = Model::default();

    for op in ops {
        match *op {
            Op::Append(v) => prop_assert_eq!(array.append(v), model.append(v)),
            Op::Read(i) => prop_assert_eq!(array.read(i), model.read(i)),
            Op::Write(i, v) => prop_assert_eq!(array.write(i, v), model.write(i, v)),
            Op::EnsureCapacity(n) => {
                prop_assert_eq!(array.ensure_capacity(n), model.ensure_capacity(n));
                if n <= MAX_CAPACITY {
                    prop_assert!(array.capacity() >= n);
                }
            }
            Op::Switch(k) => array.set_strategy(StrategyKind::ALL[k]),
        }
        prop_assert_eq!(array.size(), model.values.len());
        prop_assert!(array.size() <= array.capacity());
        prop_assert!(array.capacity() <= MAX_CAPACITY);
    }
    prop_assert_eq!(array.to_vec(), model.values.clone());
    Ok(())
}

proptest! {
    #[test]
    fn test_every_strategy_matches_the_model(ops in prop::collection::vec(op(), 0..200)) {
        for kind in StrategyKind::ALL {
            run(kind, &ops)?;
        }
    }
}

#[test]
fn test_clear_then_reuse() {
    for kind in StrategyKind::ALL {
        let mut array = ConcurrentArray::<i32>::new(kind);
        for i in 0..50 {
            array.append(i).unwrap();
        }
        array.clear();
        assert!(array.is_empty(), "{kind}");
        assert_eq!(array.append(-1), Ok(0), "{kind}");
        assert_eq!(array.to_vec(), vec![-1], "{kind}");
    }
}
