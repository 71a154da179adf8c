use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Streaming `multipart/form-data` encoder over any async writer.
///
/// Parts are written as they are added; nothing is buffered beyond the
/// writer's own buffering. Call [`finish`](Self::finish) to write the closing
/// boundary.
pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
    wrote_part: bool,
}

impl<W: AsyncWrite + Unpin> MultipartWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_boundary(inner, uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(inner: W, boundary: impl Into<String>) -> Self {
        Self {
            inner,
            boundary: boundary.into(),
            wrote_part: false,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Write a plain form field.
    pub async fn write_field(&mut self, name: &str, value: &[u8]) -> std::io::Result<()> {
        let headers = format!(
            "Content-Disposition: form-data; name=\"{}\"\r\n",
            escape_quotes(name)
        );
        self.begin_part(&headers).await?;
        self.inner.write_all(value).await
    }

    /// Write a file field whose content is already in memory.
    pub async fn write_file(
        &mut self,
        name: &str,
        filename: &str,
        data: &[u8],
    ) -> std::io::Result<()> {
        self.begin_file(name, filename).await?;
        self.inner.write_all(data).await
    }

    /// Write a file field by streaming `reader` to the end.
    pub async fn copy_file<R: AsyncRead + Unpin>(
        &mut self,
        name: &str,
        filename: &str,
        reader: &mut R,
    ) -> std::io::Result<u64> {
        self.begin_file(name, filename).await?;
        tokio::io::copy(reader, &mut self.inner).await
    }

    /// Write the closing boundary, flush, and shut the writer down.
    pub async fn finish(mut self) -> std::io::Result<W> {
        let closing = if self.wrote_part {
            format!("\r\n--{}--\r\n", self.boundary)
        } else {
            format!("--{}--\r\n", self.boundary)
        };
        self.inner.write_all(closing.as_bytes()).await?;
        self.inner.flush().await?;
        self.inner.shutdown().await?;
        Ok(self.inner)
    }

    async fn begin_file(&mut self, name: &str, filename: &str) -> std::io::Result<()> {
        let headers = format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n",
            escape_quotes(name),
            escape_quotes(filename),
        );
        self.begin_part(&headers).await
    }

    async fn begin_part(&mut self, headers: &str) -> std::io::Result<()> {
        let delimiter = if self.wrote_part { "\r\n--" } else { "--" };
        let head = format!("{delimiter}{}\r\n{headers}\r\n", self.boundary);
        self.inner.write_all(head.as_bytes()).await?;
        self.wrote_part = true;
        Ok(())
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encodes_fields_and_files_in_order() {
        let mut form = MultipartWriter::with_boundary(Vec::new(), "XYZ");
        form.write_field("metadata", b"{}").await.unwrap();
        form.write_file("file", "functions/a.ts", b"export {}")
            .await
            .unwrap();
        let body = form.finish().await.unwrap();

        let expected = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"metadata\"\r\n\
            \r\n\
            {}\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"functions/a.ts\"\r\n\
            Content-Type: application/octet-stream\r\n\
            \r\n\
            export {}\r\n\
            --XYZ--\r\n";
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[tokio::test]
    async fn empty_form_is_just_the_closing_boundary() {
        let form = MultipartWriter::with_boundary(Vec::new(), "XYZ");
        let body = form.finish().await.unwrap();
        assert_eq!(body, b"--XYZ--\r\n");
    }

    #[tokio::test]
    async fn copy_file_streams_reader() {
        let mut form = MultipartWriter::with_boundary(Vec::new(), "B");
        let copied = form
            .copy_file("file", "hello.eszip", &mut &b"EZBR...."[..])
            .await
            .unwrap();
        let body = String::from_utf8(form.finish().await.unwrap()).unwrap();

        assert_eq!(copied, 8);
        assert!(body.contains("filename=\"hello.eszip\"\r\n"));
        assert!(body.contains("\r\n\r\nEZBR....\r\n--B--\r\n"));
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(escape_quotes(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn content_type_names_boundary() {
        let form = MultipartWriter::with_boundary(Vec::<u8>::new(), "abc");
        assert_eq!(form.content_type(), "multipart/form-data; boundary=abc");
        assert_eq!(form.boundary(), "abc");
    }

    #[test]
    fn generated_boundaries_differ() {
        let a = MultipartWriter::new(Vec::<u8>::new());
        let b = MultipartWriter::new(Vec::<u8>::new());
        assert_ne!(a.boundary(), b.boundary());
        assert_eq!(a.boundary().len(), 32);
    }
}
