use std::io;

/// Приёмник байтов.
///
/// Каждый вызов возвращает число принятых байтов; оно может быть меньше
/// запрошенного при усечении. Ошибок приёмник не поднимает: их признаки
/// хранятся в его собственном состоянии (см. [`FixedBuf::overflow`] и
/// [`IoSink::last_error`]).
pub trait Sink {
    /// Принимает байты и возвращает, сколько из них записано.
    fn write(&mut self, bytes: &[u8]) -> usize;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }
}

/// Растущий буфер: принимает всё.
impl Sink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        self.extend_from_slice(bytes);
        bytes.len()
    }
}

/// Приёмник с фиксированным буфером.
///
/// Дописывает в срез до его ёмкости; лишнее отбрасывается, и взводится
/// флаг переполнения. Вызывающий код обнаруживает усечение через
/// [`FixedBuf::overflow`] либо по `len() == capacity()`.
#[derive(Debug)]
pub struct FixedBuf<'a> {
    buf: &'a mut [u8],
    len: usize,
    overflow: bool,
}

impl<'a> FixedBuf<'a> {
    /// Создаёт приёмник поверх данного среза.
    pub fn new(buf: &'a mut [u8]) -> FixedBuf<'a> {
        FixedBuf { buf, len: 0, overflow: false }
    }

    /// Число записанных байтов.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Возвращает true, если ничего не записано.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ёмкость нижележащего среза.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Возвращает true, если хотя бы одна запись была усечена.
    pub fn overflow(&self) -> bool {
        self.overflow
    }

    /// Записанная часть буфера.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Сбрасывает длину и флаг переполнения, позволяя переиспользовать
    /// буфер.
    pub fn clear(&mut self) {
        self.len = 0;
        self.overflow = false;
    }
}

impl<'a> Sink for FixedBuf<'a> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        let left = self.buf.len() - self.len;
        let n = if left < bytes.len() {
            self.overflow = true;
            left
        } else {
            bytes.len()
        };
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        n
    }
}

/// Приёмник, отбрасывающий байты.
///
/// Полезен для измерительных проходов: движок форматирования суммирует
/// возвращаемые значения, так что полная длина вывода известна без
/// какого-либо буфера.
#[derive(Clone, Copy, Debug, Default)]
pub struct Null;

impl Sink for Null {
    fn write(&mut self, bytes: &[u8]) -> usize {
        bytes.len()
    }
}

/// Приёмник поверх блокирующего [`io::Write`].
///
/// Ошибка ввода-вывода переводит приёмник в отказавшее состояние: все
/// последующие записи принимают ноль байтов, а сама ошибка доступна
/// через [`IoSink::last_error`].
#[derive(Debug)]
pub struct IoSink<W> {
    wtr: W,
    err: Option<io::Error>,
}

impl<W: io::Write> IoSink<W> {
    /// Создаёт приёмник поверх данного writer.
    pub fn new(wtr: W) -> IoSink<W> {
        IoSink { wtr, err: None }
    }

    /// Возвращает первую ошибку ввода-вывода, если она была.
    pub fn last_error(&self) -> Option<&io::Error> {
        self.err.as_ref()
    }

    /// Возвращает изменяемую ссылку на нижележащий writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.wtr
    }

    /// Поглощает приёмник и возвращает владение нижележащим writer.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

impl<W: io::Write> Sink for IoSink<W> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        if self.err.is_some() {
            return 0;
        }
        match self.wtr.write_all(bytes) {
            Ok(()) => bytes.len(),
            Err(err) => {
                log::debug!("sink write failed: {err}");
                self.err = Some(err);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FixedBuf, IoSink, Null, Sink};

    #[test]
    fn fixed_buf_truncates() {
        let mut buf = [0u8; 4];
        let mut sink = FixedBuf::new(&mut buf);
        assert_eq!(sink.write(b"ab"), 2);
        assert!(!sink.overflow());
        assert_eq!(sink.write(b"cdef"), 2);
        assert!(sink.overflow());
        assert_eq!(sink.write(b"g"), 0);
        assert_eq!(sink.len(), sink.capacity());
        assert_eq!(sink.written(), b"abcd");

        sink.clear();
        assert_eq!(sink.write(b"xy"), 2);
        assert_eq!(sink.written(), b"xy");
        assert!(!sink.overflow());
    }

    #[test]
    fn vec_grows() {
        let mut out = vec![];
        assert_eq!(out.write(b"hello"), 5);
        assert_eq!(out.write(b" world"), 6);
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn null_counts() {
        assert_eq!(Null.write(b"whatever"), 8);
    }

    #[test]
    fn io_sink_remembers_failure() {
        struct Broken;
        impl std::io::Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("nope"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = IoSink::new(Broken);
        assert_eq!(sink.write(b"x"), 0);
        assert_eq!(sink.write(b"y"), 0);
        assert!(sink.last_error().is_some());

        let mut ok = IoSink::new(vec![]);
        assert_eq!(ok.write(b"data"), 4);
        assert!(ok.last_error().is_none());
        assert_eq!(ok.into_inner(), b"data");
    }
}
