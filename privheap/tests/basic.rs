use std::{collections::HashMap, mem, rc::Rc};

use privheap::{
    byte_buffer, AlignedAllocator, AllocationError, ByPointee, DefaultAllocator, ExclusiveGuard, HeapVec, PointeeEq,
    SharedGuard, SpinRwLock,
};

#[test]
fn allocate_deallocate() {
    let allocator = DefaultAllocator::<u64>::new();

    let blocks: Vec<_> = (1..=16).map(|count| (allocator.allocate(count).unwrap().expect("Non-null"), count)).collect();

    for (pointer, count) in &blocks {
        for i in 0..*count {
            unsafe { pointer.as_ptr().add(i).write((*count * 100 + i) as u64) };
        }
    }

    //  Writing to one block did not corrupt any other.
    for (pointer, count) in &blocks {
        for i in 0..*count {
            assert_eq!((*count * 100 + i) as u64, unsafe { pointer.as_ptr().add(i).read() });
        }
    }

    for (pointer, count) in blocks {
        unsafe { allocator.deallocate(pointer, count) };
    }
}

#[test]
fn allocate_zero() {
    assert_eq!(Ok(None), DefaultAllocator::<u64>::new().allocate(0));
    assert_eq!(Ok(None), AlignedAllocator::<u64, 64>::new().allocate(0));
}

#[test]
fn allocate_too_long() {
    let allocator = DefaultAllocator::<u32>::new();

    assert_eq!(
        Err(AllocationError::LengthTooLong { count: usize::MAX, max: allocator.max_size() }),
        allocator.allocate(usize::MAX)
    );

    let aligned = AlignedAllocator::<u32, 4096>::new();

    assert_eq!(
        Err(AllocationError::LengthTooLong { count: usize::MAX, max: aligned.max_size() }),
        aligned.allocate(usize::MAX)
    );
}

#[test]
fn aligned_allocations() {
    fn check<T, const A: usize>() {
        let allocator = AlignedAllocator::<T, A>::new();
        let alignment = mem::align_of::<T>().max(A);

        assert_eq!(alignment, allocator.alignment());

        for count in [1, 2, 3, 7, 64, 1000] {
            let pointer = allocator.allocate(count).unwrap().expect("Non-null");

            assert_eq!(0, pointer.as_ptr() as usize % alignment, "{} x {}", count, alignment);

            unsafe {
                pointer.as_ptr().cast::<u8>().write_bytes(0xCD, count * mem::size_of::<T>());
                allocator.deallocate(pointer, count);
            }
        }
    }

    check::<u8, 1>();
    check::<u8, 16>();
    check::<u8, 32>();
    check::<u16, 64>();
    check::<u32, 128>();
    check::<u64, 4096>();
    check::<[u8; 5], 8>();
}

#[test]
fn allocator_equality() {
    assert!(DefaultAllocator::<u8>::new() == DefaultAllocator::<String>::new());

    assert!(AlignedAllocator::<u8, 8>::new() == AlignedAllocator::<u64, 8>::new());
    assert!(AlignedAllocator::<u8, 8>::new() != AlignedAllocator::<u8, 16>::new());
}

#[test]
fn heap_vec() {
    let mut vec = HeapVec::new_in(DefaultAllocator::new());

    for i in 0..10_000u32 {
        vec.push(i.to_string());
    }

    assert_eq!("9999", vec[9_999]);

    vec.retain(|s| s.len() < 4);
    vec.shrink_to_fit();

    assert_eq!(1_000, vec.len());
}

#[test]
fn unique_values() {
    let allocator = DefaultAllocator::<String>::new();

    let mut unique = allocator.new_unique(String::from("Hello")).expect("Allocated");
    unique.push_str(", World!");

    assert_eq!("Hello, World!", unique.as_str());

    let aligned = AlignedAllocator::<[u64; 4], 64>::new();
    let line = aligned.new_unique([1, 2, 3, 4]).expect("Allocated");

    assert_eq!(0, line.as_ptr() as usize % 64);
    assert_eq!(10, line.iter().sum::<u64>());
}

#[test]
fn byte_buffers() {
    let mut buffer = byte_buffer(4096).expect("Allocated");

    assert_eq!(4096, buffer.len());
    assert!(buffer.iter().all(|b| *b == 0));

    buffer[..5].copy_from_slice(b"Hello");

    assert_eq!(b"Hello", &buffer[..5]);

    let empty = byte_buffer(0).expect("Allocated");

    assert!(empty.is_empty());
}

#[test]
fn pointee_keys() {
    let mut map = HashMap::new();

    map.insert(ByPointee(Some(Rc::new(String::from("key")))), 1);

    assert_eq!(Some(&1), map.get(&ByPointee(Some(Rc::new(String::from("key"))))));
    assert_eq!(None, map.get(&ByPointee(None)));

    assert!(PointeeEq.eq(&Some(Rc::new(3)), &Some(Rc::new(3))));
    assert!(!PointeeEq.eq(&Some(Rc::new(3)), &None));
}

#[test]
fn lock_guards() {
    let lock = SpinRwLock::new();

    {
        let first = SharedGuard::new(&lock);
        let second = SharedGuard::new(&lock);

        assert!(first.is_held() && second.is_held());
        assert!(!ExclusiveGuard::try_new(&lock).is_held());
    }

    let exclusive = ExclusiveGuard::try_new(&lock);

    assert!(exclusive.is_held());
    assert!(!SharedGuard::try_new(&lock).is_held());

    exclusive.unlock();

    assert!(SharedGuard::try_new(&lock).is_held());
}
