//! SQL schema for the Mentor SQLite store.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    username      TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    name          TEXT NOT NULL,
    role          TEXT NOT NULL,   -- 'teacher' | 'student' | 'admin'
    class_id      TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    deleted_at    TEXT             -- soft delete
);

-- Usernames are unique among live accounts only.
CREATE UNIQUE INDEX IF NOT EXISTS users_username_idx
    ON users(username) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS users_class_idx ON users(class_id);

CREATE TABLE IF NOT EXISTS classes (
    class_id   TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    teacher_id TEXT NOT NULL,
    code       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assignments (
    assignment_id TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    teacher_id    TEXT NOT NULL,
    kind          TEXT NOT NULL,   -- 'code' | 'choice' | 'fill' | 'mixed'
    status        TEXT NOT NULL,   -- 'draft' | 'published' | 'closed'
    class_id      TEXT,            -- legacy direct publish
    rubric        TEXT,            -- JSON
    deadline      TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    question_id   TEXT PRIMARY KEY,
    assignment_id TEXT NOT NULL REFERENCES assignments(assignment_id),
    kind          TEXT NOT NULL,   -- 'choice' | 'fill' | 'code'
    options       TEXT,            -- JSON array, choice only
    content       TEXT NOT NULL,
    answer        TEXT NOT NULL,
    score         INTEGER NOT NULL,
    order_num     INTEGER NOT NULL
);

-- Classes are not referenced: a deleted class leaves its publications behind.
CREATE TABLE IF NOT EXISTS publications (
    publication_id TEXT PRIMARY KEY,
    assignment_id  TEXT NOT NULL REFERENCES assignments(assignment_id),
    class_id       TEXT NOT NULL,
    deadline       TEXT,
    released_at    TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    UNIQUE (assignment_id, class_id)
);

CREATE TABLE IF NOT EXISTS submissions (
    submission_id     TEXT PRIMARY KEY,
    assignment_id     TEXT NOT NULL REFERENCES assignments(assignment_id),
    student_id        TEXT NOT NULL,
    student_name      TEXT NOT NULL,
    answers           TEXT NOT NULL DEFAULT '{}',
    code              TEXT NOT NULL DEFAULT '',
    total_score       INTEGER,
    ai_feedback       TEXT NOT NULL DEFAULT '',
    teacher_feedback  TEXT NOT NULL DEFAULT '',
    question_scores   TEXT NOT NULL DEFAULT '{}',
    question_feedback TEXT NOT NULL DEFAULT '{}',
    status            TEXT NOT NULL,   -- 'submitted' | 'graded'
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    UNIQUE (assignment_id, student_id)
);

CREATE TABLE IF NOT EXISTS feedback (
    feedback_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    title            TEXT NOT NULL,
    content          TEXT NOT NULL,
    anonymous_id     TEXT NOT NULL,
    kind             TEXT NOT NULL,
    status           TEXT NOT NULL,
    like_count       INTEGER NOT NULL DEFAULT 0,
    teacher_response TEXT,
    responded_at     TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_sessions (
    session_id TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    title      TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Append-only.
CREATE TABLE IF NOT EXISTS chat_messages (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES chat_sessions(session_id),
    role       TEXT NOT NULL,   -- 'system' | 'user' | 'assistant'
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS questions_assignment_idx   ON questions(assignment_id);
CREATE INDEX IF NOT EXISTS submissions_assignment_idx ON submissions(assignment_id);
CREATE INDEX IF NOT EXISTS chat_sessions_user_idx     ON chat_sessions(user_id);
CREATE INDEX IF NOT EXISTS chat_messages_session_idx  ON chat_messages(session_id);

PRAGMA user_version = 1;
";
