//! Tests for ring buffer implementations

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::ringbuf::basic::RingBuffer;
    use crate::ringbuf::blocking::BlockingRing;

    #[test]
    fn test_ring_buffer_basic() {
        let buffer: RingBuffer<i32> = RingBuffer::new(4).unwrap();
        let producer = buffer.producer();
        let consumer = buffer.consumer();

        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 4);

        producer.try_push(1).unwrap();
        producer.try_push(2).unwrap();

        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_empty());

        assert_eq!(consumer.try_pop().unwrap(), 1);
        assert_eq!(consumer.try_pop().unwrap(), 2);

        assert!(buffer.is_empty());
        assert!(consumer.try_pop().is_err());
    }

    #[test]
    fn test_ring_buffer_rejects_bad_capacity() {
        assert!(RingBuffer::<u8>::new(0).is_err());
        assert!(RingBuffer::<u8>::new(3).is_err());
        assert!(RingBuffer::<u8>::with_any_capacity(0).is_err());
        assert!(RingBuffer::<u8>::with_any_capacity(3).is_ok());
    }

    #[test]
    fn test_ring_buffer_fifo_order_capacity_16() {
        let buffer: RingBuffer<u32> = RingBuffer::new(16).unwrap();
        let producer = buffer.producer();
        let consumer = buffer.consumer();

        for i in 0..16u32 {
            producer.try_push(i).unwrap();
        }
        assert!(buffer.is_full());
        assert!(producer.try_push(16).is_err());

        for i in 0..16u32 {
            assert_eq!(consumer.try_pop().unwrap(), i);
        }
        assert!(consumer.try_pop().is_err());
    }

    #[test]
    fn test_ring_buffer_wrap_around() {
        let buffer: RingBuffer<i32> = RingBuffer::new(4).unwrap();
        let producer = buffer.producer();
        let consumer = buffer.consumer();

        for i in 0..4 {
            producer.try_push(i).unwrap();
        }
        for i in 0..2 {
            assert_eq!(consumer.try_pop().unwrap(), i);
        }

        producer.try_push(4).unwrap();
        producer.try_push(5).unwrap();

        for expected in 2..6 {
            assert_eq!(consumer.try_pop().unwrap(), expected);
        }
    }

    #[test]
    fn test_ring_buffer_modulo_mode() {
        let buffer: RingBuffer<u32> = RingBuffer::with_any_capacity(5).unwrap();
        let producer = buffer.producer();
        let consumer = buffer.consumer();

        // Wrap several times to exercise the modulo path
        for round in 0..3u32 {
            for i in 0..5u32 {
                producer.try_push(round * 10 + i).unwrap();
            }
            assert!(producer.try_push(99).is_err());
            for i in 0..5u32 {
                assert_eq!(consumer.try_pop().unwrap(), round * 10 + i);
            }
        }
    }

    #[test]
    fn test_ring_buffer_peek() {
        let buffer: RingBuffer<i32> = RingBuffer::new(4).unwrap();
        let producer = buffer.producer();
        let consumer = buffer.consumer();

        assert!(consumer.peek().is_err());
        producer.try_push(7).unwrap();
        assert_eq!(*consumer.peek().unwrap(), 7);
        assert_eq!(buffer.len(), 1);
        assert_eq!(consumer.try_pop().unwrap(), 7);
    }

    #[test]
    fn test_ring_buffer_reset() {
        let buffer: RingBuffer<i32> = RingBuffer::new(4).unwrap();
        let producer = buffer.producer();

        producer.try_push(1).unwrap();
        producer.try_push(2).unwrap();
        buffer.reset();

        assert!(buffer.is_empty());
        assert_eq!(buffer.available_space(), 4);
        buffer.producer().try_push(3).unwrap();
        assert_eq!(buffer.consumer().try_pop().unwrap(), 3);
    }

    #[test]
    fn test_blocking_ring_nonblocking_path() {
        let ring: BlockingRing<u32> = BlockingRing::new(2).unwrap();

        ring.try_push(1).unwrap();
        ring.try_push(2).unwrap();
        assert!(ring.try_push(3).is_err());

        assert_eq!(ring.try_pop().unwrap(), 1);
        assert_eq!(ring.try_pop().unwrap(), 2);
        assert!(ring.try_pop().is_err());
    }

    #[test]
    fn test_blocking_ring_zero_timeout_is_nonblocking() {
        let ring: BlockingRing<u32> = BlockingRing::new(2).unwrap();

        let start = Instant::now();
        assert!(ring.pop_timeout(Some(Duration::ZERO)).is_err());
        assert!(start.elapsed() < Duration::from_millis(50));

        ring.push_timeout(1, Some(Duration::ZERO)).unwrap();
        ring.push_timeout(2, Some(Duration::ZERO)).unwrap();
        assert!(ring.push_timeout(3, Some(Duration::ZERO)).is_err());
    }

    #[test]
    fn test_blocking_ring_pop_timeout_elapses() {
        let ring: BlockingRing<u32> = BlockingRing::new(4).unwrap();
        let start = Instant::now();
        assert!(ring.pop_timeout(Some(Duration::from_millis(20))).is_err());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_blocking_ring_cross_thread_handoff() {
        use std::sync::Arc;
        use std::thread;

        let ring: Arc<BlockingRing<u32>> = Arc::new(BlockingRing::new(4).unwrap());

        let consumer = {
            let ring = ring.clone();
            thread::spawn(move || {
                let mut out = Vec::new();
                for _ in 0..8 {
                    out.push(ring.pop_timeout(Some(Duration::from_secs(5))).unwrap());
                }
                out
            })
        };

        for i in 0..8u32 {
            ring.push_timeout(i, Some(Duration::from_secs(5))).unwrap();
        }

        assert_eq!(consumer.join().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_blocking_ring_reset() {
        let mut ring: BlockingRing<u32> = BlockingRing::new(2).unwrap();
        ring.try_push(1).unwrap();
        ring.reset();
        assert!(ring.is_empty());
        ring.try_push(2).unwrap();
        ring.try_push(3).unwrap();
        assert!(ring.try_push(4).is_err());
    }
}
